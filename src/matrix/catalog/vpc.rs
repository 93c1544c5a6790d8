use crate::matrix::case::Coverage;
use crate::matrix::suite::Suite;
use crate::matrix::variables::{string_map, strings, VariableSet};

const MODULE: &str = "vpc";

fn base() -> VariableSet {
    VariableSet::new()
        .set("project_name", "test-project")
        .set("environment", "test")
        .set("vpc_cidr", "10.0.0.0/16")
        .set("public_subnet_cidrs", strings(&["10.0.1.0/24"]))
        .set("private_subnet_cidrs", strings(&["10.0.10.0/24"]))
        .set("availability_zones", strings(&["us-east-1a"]))
        .set("enable_nat_gateway", false)
        .set("tags", string_map(&[]))
}

fn cidrs(vpc: &str, public: &[&str], private: &[&str]) -> VariableSet {
    VariableSet::new()
        .set("vpc_cidr", vpc)
        .set("public_subnet_cidrs", strings(public))
        .set("private_subnet_cidrs", strings(private))
}

pub fn suites() -> Vec<Suite> {
    vec![
        Suite::single(
            "TestVpcModuleVariablesValidation",
            MODULE,
            base()
                .set("public_subnet_cidrs", strings(&["10.0.1.0/24", "10.0.2.0/24"]))
                .set("private_subnet_cidrs", strings(&["10.0.10.0/24", "10.0.11.0/24"]))
                .set("availability_zones", strings(&["us-east-1a", "us-east-1b"]))
                .set("enable_nat_gateway", true)
                .set(
                    "tags",
                    string_map(&[("Environment", "test"), ("ManagedBy", "terratest")]),
                ),
            &[Coverage::Baseline],
        ),
        Suite::new(
            "TestVpcModuleCIDRValidation",
            MODULE,
            base().set("availability_zones", strings(&["us-east-1a", "us-east-1b"])),
        )
        .case_covering(
            "ValidStandardCIDR",
            cidrs(
                "10.0.0.0/16",
                &["10.0.1.0/24", "10.0.2.0/24"],
                &["10.0.10.0/24", "10.0.11.0/24"],
            ),
            &[Coverage::MaximumSize],
        )
        .case(
            "ValidSmallCIDR",
            cidrs(
                "172.16.0.0/20",
                &["172.16.0.0/24", "172.16.1.0/24"],
                &["172.16.2.0/24", "172.16.3.0/24"],
            ),
        )
        .case_covering(
            "ValidSingleSubnet",
            cidrs("192.168.0.0/16", &["192.168.1.0/24"], &["192.168.10.0/24"]),
            &[Coverage::MinimumSize],
        ),
        Suite::new("TestVpcModuleNATGatewayConfiguration", MODULE, base())
            .case(
                "NATGatewayEnabled",
                VariableSet::new().set("enable_nat_gateway", true),
            )
            .case_covering(
                "NATGatewayDisabled",
                VariableSet::new().set("enable_nat_gateway", false),
                &[Coverage::ToggleOff],
            ),
        Suite::single(
            "TestVpcModuleTagging",
            MODULE,
            base()
                .set("project_name", "my-app")
                .set("environment", "production")
                .set(
                    "tags",
                    string_map(&[
                        ("Environment", "production"),
                        ("Team", "platform"),
                        ("CostCenter", "engineering"),
                        ("ManagedBy", "terraform"),
                    ]),
                ),
            &[],
        ),
    ]
}
