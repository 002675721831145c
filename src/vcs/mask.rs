//! Redaction of credential-bearing arguments before they reach the logs.
//!
//! Only the logged copy is masked; the tool always receives the real values.

/// Replacement for a masked value.
pub const REDACTION_MARKER: &str = "******";

/// `KEY=VALUE` arguments whose key contains one of these are masked.
const SENSITIVE_KEYS: &[&str] = &[
    "P4PORT",
    "P4USER",
    "P4CLIENT",
    "P4TICKETS",
    "P4TRUST",
    "P4PASSWD",
];

/// Flags whose following argument is a secret.
const SECRET_FLAGS: &[&str] = &["-P"];

/// Byte offset of the `=` that follows a sensitive key in `arg`, if any.
fn sensitive_value_offset(arg: &str) -> Option<usize> {
    let upper = arg.to_ascii_uppercase();
    SENSITIVE_KEYS
        .iter()
        .filter_map(|key| upper.find(key).map(|start| start + key.len()))
        .filter_map(|end| arg[end..].find('=').map(|eq| end + eq))
        .min()
}

/// Masked copy of `args`, preserving key names.
pub fn mask_sensitive_args<S: AsRef<str>>(args: &[S]) -> Vec<String> {
    let mut masked = Vec::with_capacity(args.len());
    let mut mask_next = false;
    for arg in args {
        let arg = arg.as_ref();
        if mask_next {
            masked.push(REDACTION_MARKER.to_string());
            mask_next = false;
            continue;
        }
        if SECRET_FLAGS.contains(&arg) {
            mask_next = true;
            masked.push(arg.to_string());
            continue;
        }
        match sensitive_value_offset(arg) {
            Some(eq) => masked.push(format!("{}={REDACTION_MARKER}", &arg[..eq])),
            None => masked.push(arg.to_string()),
        }
    }
    masked
}

/// Loggable command line with sensitive values masked.
pub fn display_command<S: AsRef<str>>(program: &str, args: &[S]) -> String {
    let mut line = program.to_string();
    for arg in mask_sensitive_args(args) {
        line.push(' ');
        line.push_str(&arg);
    }
    line
}
