//! Adapter class naming
//!
//! An adapter for `java.util.function.IntPredicate` prepared in namespace
//! `my-app.core` is named `my_app/core/LambdaFactory$java$util$function$IntPredicate`.
//! The name depends only on the namespace and the interface, so preparing
//! the same pair twice yields the same class.

use crate::descriptor::TargetInterfaceDescriptor;
use crate::{Error, Result};

/// Simple-name prefix of every adapter class
pub const ADAPTER_PREFIX: &str = "LambdaFactory$";

const FORBIDDEN: &[char] = &[';', '[', '/'];

fn invalid(name: &str, reason: impl Into<String>) -> Error {
    Error::InvalidName {
        name: name.to_string(),
        reason: reason.into(),
    }
}

/// Munge a dotted namespace into an internal package path
fn package_path(context: &str) -> Result<String> {
    if context.is_empty() {
        return Err(invalid(context, "empty namespace"));
    }
    let mut segments = Vec::new();
    for segment in context.split('.') {
        if segment.is_empty() {
            return Err(invalid(context, "empty namespace segment"));
        }
        if let Some(c) = segment.chars().find(|c| FORBIDDEN.contains(c) || c.is_whitespace()) {
            return Err(invalid(context, format!("illegal character {:?}", c)));
        }
        segments.push(segment.replace('-', "_"));
    }
    Ok(segments.join("/"))
}

/// Internal name of the adapter for `target` in namespace `context`
pub fn adapter_name(context: &str, target: &TargetInterfaceDescriptor) -> Result<String> {
    let package = package_path(context)?;

    let interface = &target.name;
    if interface.is_empty() {
        return Err(invalid(interface, "empty interface name"));
    }
    if interface.split('.').any(str::is_empty) {
        return Err(invalid(interface, "empty interface name segment"));
    }
    if let Some(c) = interface.chars().find(|c| FORBIDDEN.contains(c)) {
        return Err(invalid(interface, format!("illegal character {:?}", c)));
    }

    Ok(format!(
        "{}/{}{}",
        package,
        ADAPTER_PREFIX,
        interface.replace('.', "$")
    ))
}
