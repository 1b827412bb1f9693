use std::collections::HashMap;

/// Flag values keyed by upper-cased flag name, one joined string per flag.
pub type Flags = HashMap<String, String>;

/// Flag values keyed by upper-cased flag name, every raw token kept.
pub type MultiFlags = HashMap<String, Vec<String>>;

const MARKER: char = '/';

fn flag_name(argument: &str) -> Option<String> {
    argument.strip_prefix(MARKER).map(str::to_uppercase)
}

/// Parses arguments where every flag carries exactly one value.
///
/// Each value token is appended as `" " + token`, so a flag with a value always
/// starts with a space. Trim at the point of use.
pub fn parse<S: AsRef<str>>(arguments: &[S]) -> Flags {
    let mut flags = Flags::new();
    let mut key = String::new();
    let mut value = String::new();

    for (index, argument) in arguments.iter().map(AsRef::as_ref).enumerate() {
        let Some(name) = flag_name(argument) else {
            value.push(' ');
            value.push_str(argument);
            continue;
        };

        if index > 0 {
            flags.insert(key, std::mem::take(&mut value));
        }
        key = name;
    }

    flags.insert(key, value);
    flags
}

/// Parses arguments where a flag may carry any number of values.
pub fn parse_multi_values<S: AsRef<str>>(arguments: &[S]) -> MultiFlags {
    let mut flags = MultiFlags::new();
    let mut key = String::new();
    let mut values = Vec::new();

    for (index, argument) in arguments.iter().map(AsRef::as_ref).enumerate() {
        let Some(name) = flag_name(argument) else {
            values.push(argument.to_string());
            continue;
        };

        if index > 0 {
            flags.insert(key, std::mem::take(&mut values));
        }
        key = name;
    }

    flags.insert(key, values);
    flags
}
