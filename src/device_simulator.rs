//! The IoT device simulator stack.
//!
//! A VPC with three public subnets hosts a Fargate service; every task runs
//! one simulated device that talks to AWS IoT. Unless an external image is
//! supplied through `ECRRepoName`, the stack also creates an ECR repository
//! and a CodeBuild project that builds the simulator image into it.

use serde_json::json;

use crate::intrinsic::{self, account_id, region, stack_name};
use crate::template::{Error, Output, Parameter, ParameterType, ResourceKind, Template};

pub const BUILT_IN_REPO: &str = "Use Built-In";
pub const DEFAULT_ACCOUNT_ID: &str = "Optional";
pub const CODEBUILD_PROJECT_NAME: &str = "AWS-IoT-DM-Demo";

const THING_NAME: &str = "${!iot:Connection.Thing.ThingName}";

pub fn build() -> Result<Template, Error> {
    let mut t = Template::new();
    t.set_version();
    t.set_description("AWS IoT Device Management demo: simulated devices on ECS Fargate");

    // Parameters
    let ecr_repo_name = t.declare_parameter(
        Parameter::new("ECRRepoName", ParameterType::String)
            .description(
                "Device Simulator ECR Repo. Modify if not using CloudFormation generated repo",
            )
            .default(json!(BUILT_IN_REPO)),
    )?;

    let project_source = t.declare_parameter(
        Parameter::new("ProjectSource", ParameterType::String)
            .description("Demo Project Source. Don't change unless you're using a clone/fork of the original project repo")
            .default(json!("https://github.com/cb17/aws-iot-device-management-demo")),
    )?;

    let number_of_devices = t.declare_parameter(
        Parameter::new("NumberOfVirtualDevices", ParameterType::Number)
            .description("Number of ECS Tasks to create. Each task simulates one device")
            .default(json!(0)),
    )?;

    let iot_endpoint = t.declare_parameter(
        Parameter::new("IoTEndpoint", ParameterType::String)
            .description("AWS IoT MQTT Endpoint PREFIX. ONLY INCLUDE THE CHARACTERS BEFORE THE FIRST DASH -")
            .allowed_pattern("[a-zA-Z0-9]*")
            .max_length(14),
    )?;

    let vpc_cidr_prefix = t.declare_parameter(
        Parameter::new("VPCCIDRPrefix", ParameterType::String)
            .description("IP Address range for the VPN connected VPC")
            .default(json!("172.31")),
    )?;

    let ecr_account_id = t.declare_parameter(
        Parameter::new("ECRAccountID", ParameterType::String)
            .description("AccountID")
            .default(json!(DEFAULT_ACCOUNT_ID)),
    )?;

    // Conditions
    let account_id_default = t.declare_condition(
        "AccountIDDefault",
        intrinsic::equals(ecr_account_id.reference(), json!(DEFAULT_ACCOUNT_ID)),
    )?;

    let ecr_repo_default = t.declare_condition(
        "ECRRepoDefault",
        intrinsic::equals(ecr_repo_name.reference(), json!(BUILT_IN_REPO)),
    )?;

    // Network
    let cidr = |suffix: &str| intrinsic::join("", vec![vpc_cidr_prefix.reference(), json!(suffix)]);

    let vpc = t.declare_resource(
        "VPC",
        ResourceKind::Vpc,
        json!({
            "EnableDnsSupport": "true",
            "CidrBlock": cidr(".0.0/16"),
            "EnableDnsHostnames": "true",
            "Tags": intrinsic::tags(&[("Application", stack_name()), ("Network", json!("VPC"))]),
        }),
        None,
    )?;

    let igw = t.declare_resource(
        "InternetGateway",
        ResourceKind::InternetGateway,
        json!({ "Tags": intrinsic::tags(&[("Network", json!("igw"))]) }),
        None,
    )?;

    t.declare_resource(
        "AttachGateway",
        ResourceKind::VpcGatewayAttachment,
        json!({
            "VpcId": vpc.reference(),
            "InternetGatewayId": igw.reference(),
        }),
        None,
    )?;

    let public_route_table = t.declare_resource(
        "PublicRouteTable",
        ResourceKind::RouteTable,
        json!({
            "VpcId": vpc.reference(),
            "Tags": intrinsic::tags(&[("Network", json!("public"))]),
        }),
        None,
    )?;

    t.declare_resource(
        "RouteToInternetForPublicSubnets",
        ResourceKind::Route,
        json!({
            "RouteTableId": public_route_table.reference(),
            "DestinationCidrBlock": "0.0.0.0/0",
            "GatewayId": igw.reference(),
        }),
        None,
    )?;

    let mut public_subnets = vec![];
    for (zone, (letter, suffix)) in [("A", ".0.0/26"), ("B", ".0.64/26"), ("C", ".0.128/26")]
        .into_iter()
        .enumerate()
    {
        let subnet = t.declare_resource(
            &format!("PublicSubnet{}", letter),
            ResourceKind::Subnet,
            json!({
                "CidrBlock": cidr(suffix),
                "VpcId": vpc.reference(),
                "AvailabilityZone": intrinsic::select(&zone.to_string(), intrinsic::get_azs(region())),
            }),
            None,
        )?;

        t.declare_resource(
            &format!("PublicSubnetRouteTableAssociation{}", letter),
            ResourceKind::SubnetRouteTableAssociation,
            json!({
                "SubnetId": subnet.reference(),
                "RouteTableId": public_route_table.reference(),
            }),
            None,
        )?;

        public_subnets.push(subnet);
    }

    let nat_eip = t.declare_resource(
        "NatEip",
        ResourceKind::Eip,
        json!({ "Domain": "vpc" }),
        None,
    )?;

    t.declare_resource(
        "NAT",
        ResourceKind::NatGateway,
        json!({
            "AllocationId": nat_eip.get_att("AllocationId"),
            "SubnetId": public_subnets[0].reference(),
        }),
        None,
    )?;

    // IAM and IoT
    let task_role = t.declare_resource(
        "DeviceSimulatorTaskRole",
        ResourceKind::IamRole,
        json!({
            "Path": "/",
            "ManagedPolicyArns": [
                "arn:aws:iam::aws:policy/CloudWatchFullAccess",
                "arn:aws:iam::aws:policy/service-role/AmazonECSTaskExecutionRolePolicy",
                "arn:aws:iam::aws:policy/service-role/AWSIoTThingsRegistration"
            ],
            "AssumeRolePolicyDocument": assume_role_policy("ecs-tasks.amazonaws.com"),
        }),
        None,
    )?;

    let iot_policy = t.declare_resource(
        "DMDemoPolicy",
        ResourceKind::IotPolicy,
        json!({
            "PolicyDocument": {
                "Version": "2012-10-17",
                "Statement": [
                    {
                        "Effect": "Allow",
                        "Action": "iot:Connect",
                        "Resource": iot_arn(&format!("client/{}", THING_NAME)),
                        "Condition": {
                            "ForAllValues:StringEquals": {
                                "iot:Certificate.Subject.CommonName": "${iot:Connection.Thing.ThingName}"
                            }
                        }
                    },
                    {
                        "Effect": "Allow",
                        "Action": "iot:Publish",
                        "Resource": thing_topics("topic"),
                    },
                    {
                        "Effect": "Allow",
                        "Action": "iot:Subscribe",
                        "Resource": thing_topics("topicfilter"),
                    },
                    {
                        "Effect": "Allow",
                        "Action": "iot:Receive",
                        "Resource": thing_topics("topic"),
                    }
                ]
            }
        }),
        None,
    )?;

    // ECS cluster and image build
    let task_log_group = t.declare_resource(
        "TaskLogGroup",
        ResourceKind::LogGroup,
        json!({
            "LogGroupName": intrinsic::sub("${AWS::StackName}-IoTClientLogs"),
            "RetentionInDays": 30,
        }),
        None,
    )?;

    let ecs_cluster = t.declare_resource(
        "ECSServiceCluster",
        ResourceKind::EcsCluster,
        json!({}),
        None,
    )?;

    let simulator_repo = t.declare_resource(
        "AWSIoTDMDemoDeviceSimulatorRepo",
        ResourceKind::EcrRepository,
        json!({}),
        Some(&ecr_repo_default),
    )?;

    let codebuild_role = t.declare_resource(
        "CodebuildServiceRole",
        ResourceKind::IamRole,
        json!({
            "Path": "/",
            "Policies": [
                {
                    "PolicyDocument": {
                        "Statement": [
                            {
                                "Action": [
                                    "ecr:BatchCheckLayerAvailability",
                                    "ecr:CompleteLayerUpload",
                                    "ecr:GetAuthorizationToken",
                                    "ecr:InitiateLayerUpload",
                                    "ecr:PutImage",
                                    "ecr:UploadLayerPart"
                                ],
                                "Resource": simulator_repo.get_att("Arn"),
                                "Effect": "Allow"
                            },
                            {
                                "Action": ["ecr:GetAuthorizationToken"],
                                "Resource": "*",
                                "Effect": "Allow"
                            }
                        ],
                        "Version": "2012-10-17"
                    },
                    "PolicyName": "ECRPermissions"
                },
                {
                    "PolicyDocument": {
                        "Statement": [
                            {
                                "Action": [
                                    "logs:CreateLogGroup",
                                    "logs:CreateLogStream",
                                    "logs:PutLogEvents"
                                ],
                                "Resource": intrinsic::sub(&format!(
                                    "arn:aws:logs:${{AWS::Region}}:${{AWS::AccountId}}:log-group:/aws/codebuild/{}*",
                                    CODEBUILD_PROJECT_NAME
                                )),
                                "Effect": "Allow"
                            }
                        ],
                        "Version": "2012-10-17"
                    },
                    "PolicyName": "StandardCodeBuildPermissions"
                }
            ],
            "AssumeRolePolicyDocument": assume_role_policy("codebuild.amazonaws.com"),
        }),
        Some(&ecr_repo_default),
    )?;

    t.declare_resource(
        "AWSIoTDMDemoProject",
        ResourceKind::CodeBuildProject,
        json!({
            "Artifacts": { "Type": "NO_ARTIFACTS" },
            "Environment": {
                "ComputeType": "BUILD_GENERAL1_LARGE",
                "Image": "aws/codebuild/standard:5.0",
                "Type": "LINUX_CONTAINER",
                "EnvironmentVariables": [
                    { "Name": "APP_NAME", "Value": "awsiotdmdemo" },
                    { "Name": "IMAGE_REPO", "Value": simulator_repo.reference() },
                    { "Name": "IMAGE_TAG", "Value": "latest" },
                    { "Name": "AWS_DEFAULT_REGION", "Value": region() },
                    { "Name": "AWS_ACCOUNT_ID", "Value": account_id() }
                ],
                "PrivilegedMode": true
            },
            "Name": CODEBUILD_PROJECT_NAME,
            "ServiceRole": codebuild_role.get_att("Arn"),
            "Source": {
                "Location": project_source.reference(),
                "Type": "GITHUB"
            },
        }),
        Some(&ecr_repo_default),
    )?;

    // Fargate task and service
    let image_account = account_id_default.choose(account_id(), ecr_account_id.reference());
    let image = ecr_repo_default.choose(
        intrinsic::join(
            "",
            vec![
                image_account,
                json!(".dkr.ecr."),
                region(),
                json!(".amazonaws.com/"),
                simulator_repo.reference(),
            ],
        ),
        ecr_repo_name.reference(),
    );

    let simulator_task = t.declare_resource(
        "DeviceSimulatorTask",
        ResourceKind::EcsTaskDefinition,
        json!({
            "Cpu": "256",
            "Memory": "512",
            "RequiresCompatibilities": ["FARGATE"],
            "NetworkMode": "awsvpc",
            "ContainerDefinitions": [
                {
                    "Essential": true,
                    "Image": image,
                    "Name": "IoTClient",
                    "LogConfiguration": {
                        "LogDriver": "awslogs",
                        "Options": {
                            "awslogs-region": region(),
                            "awslogs-group": task_log_group.reference(),
                            "awslogs-stream-prefix": "simulated-device"
                        }
                    },
                    "Environment": [
                        { "Name": "IOT_ENDPOINT", "Value": iot_endpoint.reference() },
                        { "Name": "IOT_REGION", "Value": region() },
                        { "Name": "IOT_POLICY_NAME", "Value": iot_policy.reference() }
                    ]
                }
            ],
            "TaskRoleArn": task_role.get_att("Arn"),
            "ExecutionRoleArn": task_role.get_att("Arn"),
        }),
        None,
    )?;

    let subnets = public_subnets
        .iter()
        .map(|subnet| subnet.reference())
        .collect::<Vec<_>>();

    t.declare_resource(
        "ECSService",
        ResourceKind::EcsService,
        json!({
            "LaunchType": "FARGATE",
            "Cluster": ecs_cluster.reference(),
            "DesiredCount": number_of_devices.reference(),
            "TaskDefinition": simulator_task.reference(),
            "NetworkConfiguration": {
                "AwsvpcConfiguration": {
                    "Subnets": subnets,
                    "AssignPublicIp": "ENABLED"
                }
            },
        }),
        None,
    )?;

    // Outputs
    t.declare_output(
        Output::new("ClusterName", ecs_cluster.reference())
            .description("ECS cluster running the simulated devices"),
    )?;
    t.declare_output(
        Output::new("TaskLogGroupName", task_log_group.reference())
            .description("CloudWatch log group of the device tasks"),
    )?;
    t.declare_output(
        Output::new("IoTPolicyName", iot_policy.reference())
            .description("IoT policy attached to simulated device certificates"),
    )?;
    t.declare_output(
        Output::new("DeviceSimulatorRepoUri", simulator_repo.get_att("RepositoryUri"))
            .description("ECR repository the CodeBuild project pushes the simulator image to")
            .condition(&ecr_repo_default),
    )?;

    return Ok(t);
}

fn assume_role_policy(service: &str) -> serde_json::Value {
    return json!({
        "Version": "2012-10-17",
        "Statement": [{
            "Action": ["sts:AssumeRole"],
            "Effect": "Allow",
            "Principal": {
                "Service": [service]
            }
        }]
    });
}

fn iot_arn(resource: &str) -> serde_json::Value {
    return intrinsic::sub(&format!(
        "arn:aws:iot:${{AWS::Region}}:${{AWS::AccountId}}:{}",
        resource
    ));
}

// Per-thing topics under the demo fleet and the reserved shadow/jobs prefix.
fn thing_topics(kind: &str) -> serde_json::Value {
    return json!([
        iot_arn(&format!("{}/demofleet/{}*", kind, THING_NAME)),
        iot_arn(&format!("{}/$aws/things/{}*", kind, THING_NAME)),
    ]);
}
