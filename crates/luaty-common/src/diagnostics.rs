use serde::{Deserialize, Serialize};

/// How loudly a host should surface a problem.
#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ProblemSeverity {
    Error,
    WeakWarning,
}

/// Message templates. Placeholders are `{0}`, `{1}`, ... and are filled by
/// [`format_message`].
pub mod diagnostic_messages {
    pub const TYPE_MISMATCH: &str = "Type mismatch. Required: '{0}' Found: '{1}'";
    pub const MISSING_MEMBER: &str = "Type mismatch. Missing member: '{0}' of: '{1}'";
    pub const NON_ARRAY_FIELD: &str = "Type mismatch. Required: '{0}' Found non-array field '{1}'";
    pub const MISSING_ARGUMENT: &str = "Missing argument: {0}: {1}";
    pub const MISSING_SELF_ARGUMENT: &str =
        "Missing self argument.\n\nDid you mean to call the method with a colon?";
    pub const DID_YOU_MEAN_COLON: &str = ".\n\nDid you mean to call the method with a colon?";
    pub const TOO_MANY_ARGUMENTS: &str = "Too many arguments.";
    pub const EXCESS_RESULT: &str = "1 result is an excess argument.";
    pub const EXCESS_RESULTS: &str = "{0} results are excess arguments.";
    pub const RESULT_PREFIX: &str = "Result {0}, {1}";
    pub const VARIADIC_RESULT_PREFIX: &str = "Variadic result, {0}";
    pub const IN_SIGNATURE_SUFFIX: &str = "{0}. In: {1}\n";
    pub const UNION_CANDIDATE_SUFFIX: &str = "{0}, on union candidate {1}";
}

pub fn format_message(message: &str, args: &[&str]) -> String {
    let mut result = message.to_string();
    for (i, arg) in args.iter().enumerate() {
        result = result.replace(&format!("{{{i}}}"), arg);
    }
    result
}

/// Lower-case the first character, used when a message is embedded after a
/// prefix such as `Result 2, `.
pub fn decapitalize(message: &str) -> String {
    let mut chars = message.chars();
    match chars.next() {
        Some(first) => first.to_lowercase().chain(chars).collect(),
        None => String::new(),
    }
}
