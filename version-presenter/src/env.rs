//! Places version settings can be read from and written back to.

use std::collections::HashMap;

use log::warn;

/// Read access to a set of named string settings
pub trait EnvSource {
    /// Fetch the current value of a setting, `None` if it isn't defined
    fn lookup(&self, name: &str) -> Option<String>;
}

/// A settings source that defaults can be written back into
pub trait EnvStore: EnvSource {
    /// Replace the value of a setting
    fn assign(&mut self, name: &str, value: &str);
}

/// The environment of the current process
///
/// Writing to the process environment is not synchronized with readers on
/// other threads on every platform. Only assign values from a point where no
/// other thread is reading the environment.
#[derive(Debug, Default, Clone, Copy)]
pub struct ProcessEnv;

impl EnvSource for ProcessEnv {
    fn lookup(&self, name: &str) -> Option<String> {
        match std::env::var(name) {
            Ok(value) => Some(value),
            Err(std::env::VarError::NotPresent) => None,
            Err(std::env::VarError::NotUnicode(_)) => {
                warn!("Environment variable {name} is not valid unicode, treating it as unset");
                None
            }
        }
    }
}

impl EnvStore for ProcessEnv {
    fn assign(&mut self, name: &str, value: &str) {
        std::env::set_var(name, value);
    }
}

impl EnvSource for HashMap<String, String> {
    fn lookup(&self, name: &str) -> Option<String> {
        self.get(name).cloned()
    }
}

impl EnvStore for HashMap<String, String> {
    fn assign(&mut self, name: &str, value: &str) {
        self.insert(name.to_owned(), value.to_owned());
    }
}

impl<T: EnvSource + ?Sized> EnvSource for std::sync::Arc<T> {
    fn lookup(&self, name: &str) -> Option<String> {
        (**self).lookup(name)
    }
}
