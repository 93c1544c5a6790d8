use crate::matrix::case::Coverage;
use crate::matrix::suite::Suite;
use crate::matrix::variables::{string_map, strings, VariableSet};

const MODULE: &str = "ecs";

fn base() -> VariableSet {
    VariableSet::new()
        .set("project_name", "test-project")
        .set("environment", "test")
        .set("aws_region", "us-east-1")
        .set("vpc_id", "vpc-12345678")
        .set("public_subnet_ids", strings(&["subnet-pub1"]))
        .set("private_subnet_ids", strings(&["subnet-priv1"]))
        .set("docker_image", "nginx:latest")
        .set("container_name", "app")
        .set("container_port", 80)
        .set("task_cpu", 256)
        .set("task_memory", 512)
        .set("desired_count", 1)
        .set("min_capacity", 1)
        .set("max_capacity", 2)
        .set("health_check_path", "/")
        .set("secrets_manager_arns", strings(&[]))
        .set("enable_container_insights", false)
        .set("log_retention_days", 7)
        .set("tags", string_map(&[]))
}

fn container(image: &str, port: u16, cpu: u32, memory: u32) -> VariableSet {
    VariableSet::new()
        .set("docker_image", image)
        .set("container_port", port)
        .set("task_cpu", cpu)
        .set("task_memory", memory)
}

fn scale(desired: u32, min: u32, max: u32) -> VariableSet {
    VariableSet::new()
        .set("desired_count", desired)
        .set("min_capacity", min)
        .set("max_capacity", max)
}

pub fn suites() -> Vec<Suite> {
    let two_subnets = base()
        .set("public_subnet_ids", strings(&["subnet-pub1", "subnet-pub2"]))
        .set("private_subnet_ids", strings(&["subnet-priv1", "subnet-priv2"]));

    vec![
        Suite::single(
            "TestEcsModuleVariablesValidation",
            MODULE,
            two_subnets
                .clone()
                .set("container_port", 8080)
                .set("desired_count", 2)
                .set("max_capacity", 4)
                .set("health_check_path", "/health")
                .set(
                    "secrets_manager_arns",
                    strings(&["arn:aws:secretsmanager:us-east-1:123456789012:secret:test"]),
                )
                .set("enable_container_insights", true)
                .set("log_retention_days", 30)
                .set("tags", string_map(&[("Environment", "test")])),
            &[Coverage::Baseline],
        ),
        Suite::new("TestEcsModuleContainerConfiguration", MODULE, base())
            .case_covering(
                "NginxDefault",
                container("nginx:latest", 80, 256, 512),
                &[Coverage::MinimumSize, Coverage::ToggleOff],
            )
            .case(
                "CustomAppHighMemory",
                container("myuser/myapp:v1.0.0", 8080, 512, 1024),
            )
            .case_covering(
                "HeavyWorkload",
                container("myuser/processor:latest", 3000, 1024, 2048),
                &[Coverage::MaximumSize],
            ),
        Suite::new(
            "TestEcsModuleAutoScalingConfiguration",
            MODULE,
            two_subnets
                .set("enable_container_insights", true)
                .set("log_retention_days", 14),
        )
        .case_covering("SmallScale", scale(1, 1, 2), &[Coverage::MinimumSize])
        .case("MediumScale", scale(3, 2, 6))
        .case_covering("LargeScale", scale(5, 3, 10), &[Coverage::MaximumSize]),
        Suite::new("TestEcsModuleDockerImageFormats", MODULE, base()).sweep(
            "docker_image",
            "",
            [
                "nginx",
                "nginx:latest",
                "nginx:1.25.0",
                "myuser/myapp",
                "myuser/myapp:v1.0.0",
                "myuser/myapp:latest",
                "ghcr.io/owner/image:tag",
            ],
        ),
    ]
}
