//! Local clock reads.

use chrono::Local;

use super::{handler, no_params};
use crate::skills::descriptor::{InvocationError, Operation, SkillDescriptor};

pub(super) fn descriptor() -> SkillDescriptor {
    SkillDescriptor::new("time", "Get current time, date, and timezone information")
        .with_tags(["time", "date", "utility"])
        .with_author("Skill System")
        .with_operation(Operation::new(
            "get_current_time",
            "Get the current date and time",
            no_params(),
            handler(current_time),
        ))
        .with_operation(Operation::new(
            "get_current_date",
            "Get the current date",
            no_params(),
            handler(current_date),
        ))
        .with_operation(Operation::new(
            "get_timestamp",
            "Get the current Unix timestamp",
            no_params(),
            handler(timestamp),
        ))
}

fn current_time(_args: &serde_json::Value) -> Result<String, InvocationError> {
    Ok(format!(
        "Current time: {}",
        Local::now().format("%Y-%m-%d %H:%M:%S")
    ))
}

fn current_date(_args: &serde_json::Value) -> Result<String, InvocationError> {
    Ok(format!("Current date: {}", Local::now().format("%Y-%m-%d")))
}

fn timestamp(_args: &serde_json::Value) -> Result<String, InvocationError> {
    Ok(format!("Unix timestamp: {}", Local::now().timestamp()))
}
