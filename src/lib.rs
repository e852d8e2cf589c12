//! Generator for the CloudFormation template of the AWS IoT device
//! simulator demo.
//!
//! [`template::Template`] collects declarations and renders them;
//! [`device_simulator::build`] declares the demo stack.

pub mod config;
pub mod device_simulator;
pub mod intrinsic;
pub mod references;
pub mod template;
pub mod writer;
