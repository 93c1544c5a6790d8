use crate::matrix::case::Coverage;
use crate::matrix::suite::Suite;
use crate::matrix::variables::{string_map, strings, VariableSet};
use serde_json::Value;

const MODULE: &str = "ec2-splunk";

fn base() -> VariableSet {
    VariableSet::new()
        .set("project_name", "test-project")
        .set("environment", "test")
        .set("vpc_id", "vpc-12345678")
        .set("subnet_id", "subnet-12345678")
        .set("availability_zone", "us-east-1a")
        .set("ami_id", "ami-0c7217cdde317cfec")
        .set("instance_type", "t3.medium")
        .set("root_volume_size", 50)
        .set("data_volume_size", 100)
        .set("data_volume_type", "gp3")
        .set("kms_key_id", Value::Null)
        .set("splunk_admin_password", "SplunkAdmin123!")
        .set("splunk_hec_token", "12345678-1234-1234-1234-123456789012")
        .set("splunk_version", "9.1.1")
        .set("allowed_cidr", strings(&["10.0.0.0/8"]))
        .set("ssh_cidr", strings(&["10.0.0.0/8"]))
        .set("ssh_public_key", "ssh-rsa AAAAB3NzaC1yc2EAAAADAQABAAABAQtest")
        .set("associate_public_ip", false)
        .set("secrets_manager_arn", "")
        .set("tags", string_map(&[]))
}

fn instance(instance_type: &str, root_volume: u32, data_volume: u32) -> VariableSet {
    VariableSet::new()
        .set("instance_type", instance_type)
        .set("root_volume_size", root_volume)
        .set("data_volume_size", data_volume)
}

fn network(allowed: &[&str], ssh: &[&str], public_ip: bool) -> VariableSet {
    VariableSet::new()
        .set("allowed_cidr", strings(allowed))
        .set("ssh_cidr", strings(ssh))
        .set("associate_public_ip", public_ip)
}

pub fn suites() -> Vec<Suite> {
    vec![
        Suite::single(
            "TestEc2SplunkModuleVariablesValidation",
            MODULE,
            base()
                .set(
                    "ssh_public_key",
                    "ssh-rsa AAAAB3NzaC1yc2EAAAADAQABAAABAQ... test-key",
                )
                .set("associate_public_ip", true)
                .set("tags", string_map(&[("Environment", "test")])),
            &[Coverage::Baseline],
        ),
        Suite::new("TestEc2SplunkModuleInstanceTypes", MODULE, base())
            .case_covering(
                "SmallInstance",
                instance("t3.medium", 30, 50),
                &[Coverage::MinimumSize],
            )
            .case("MediumInstance", instance("t3.large", 50, 100))
            .case("LargeInstance", instance("t3.xlarge", 100, 500))
            .case_covering(
                "ProductionInstance",
                instance("r5.large", 100, 1000),
                &[Coverage::MaximumSize],
            ),
        Suite::new("TestEc2SplunkModuleVolumeTypes", MODULE, base()).sweep(
            "data_volume_type",
            "",
            ["gp2", "gp3", "io1", "io2"],
        ),
        Suite::new("TestEc2SplunkModuleNetworkConfiguration", MODULE, base())
            .case_covering(
                "PrivateOnly",
                network(&["10.0.0.0/8"], &["10.0.0.0/8"], false),
                &[Coverage::ToggleOff],
            )
            .case(
                "PublicAccess",
                network(&["0.0.0.0/0"], &["203.0.113.0/24"], true),
            )
            .case(
                "MultiCIDR",
                network(
                    &["10.0.0.0/8", "172.16.0.0/12", "192.168.0.0/16"],
                    &["10.0.0.0/8"],
                    false,
                ),
            ),
        Suite::new("TestEc2SplunkModuleSplunkVersions", MODULE, base()).sweep(
            "splunk_version",
            "Splunk_",
            ["9.0.0", "9.0.5", "9.1.0", "9.1.1", "9.2.0"],
        ),
    ]
}
