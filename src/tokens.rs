use crate::PlotError;

pub const HELP_FLAG: &str = "-h";

/// Flags in first-appearance order, each with the values that followed it.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct FlagMap {
    entries: Vec<(String, Vec<String>)>,
    stray: Vec<String>,
}

impl FlagMap {
    pub fn new() -> Self {
        FlagMap::default()
    }

    /// Opens an empty value list for `flag`. A flag seen earlier keeps its
    /// position but loses the values collected so far.
    fn open(&mut self, flag: &str) {
        match self.entries.iter_mut().find(|(f, _)| f == flag) {
            Some((_, values)) => values.clear(),
            None => self.entries.push((flag.to_string(), Vec::new())),
        }
    }

    fn push_value(&mut self, flag: &str, value: &str) {
        if let Some((_, values)) = self.entries.iter_mut().find(|(f, _)| f == flag) {
            values.push(value.to_string());
        }
    }

    pub fn get(&self, flag: &str) -> Option<&[String]> {
        self.entries
            .iter()
            .find(|(f, _)| f == flag)
            .map(|(_, values)| values.as_slice())
    }

    /// First value given for `flag`, if the flag is present and has one.
    pub fn first(&self, flag: &str) -> Option<&str> {
        self.get(flag)
            .and_then(|values| values.first())
            .map(String::as_str)
    }

    pub fn contains(&self, flag: &str) -> bool {
        self.get(flag).is_some()
    }

    pub fn flags(&self) -> impl Iterator<Item = &str> {
        self.entries.iter().map(|(f, _)| f.as_str())
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &[String])> {
        self.entries
            .iter()
            .map(|(f, values)| (f.as_str(), values.as_slice()))
    }

    /// Value tokens that appeared before any flag and were ignored.
    pub fn stray(&self) -> &[String] {
        &self.stray
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

/// Splits the raw arguments (program name excluded) into a [`FlagMap`].
///
/// `-h` has to be the only argument when present.
pub fn tokenize<S: AsRef<str>>(args: &[S]) -> Result<FlagMap, PlotError> {
    if args.len() > 1 && args.iter().any(|a| a.as_ref() == HELP_FLAG) {
        return Err(PlotError::InvalidTokenSequence(
            "-h must be the only argument when it is included".to_string(),
        ));
    }

    let mut flags = FlagMap::new();
    let mut current: Option<String> = None;

    for arg in args.iter().map(AsRef::as_ref) {
        if arg.starts_with('-') {
            flags.open(arg);
            current = Some(arg.to_string());
        } else if let Some(flag) = &current {
            flags.push_value(flag, arg);
        } else {
            eprintln!("Invalid argument: {}", arg);
            log::debug!("ignoring value {} given before any flag", arg);
            flags.stray.push(arg.to_string());
        }
    }

    for (flag, values) in flags.iter() {
        log::debug!("Flag: {}, Values: {:?}", flag, values);
    }

    Ok(flags)
}
