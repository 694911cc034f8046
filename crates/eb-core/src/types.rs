use std::fmt;
use std::str::FromStr;
use std::time::Duration;

use crate::error::BridgeError;

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum EngineKind {
    /// Rhai, an AST-walking interpreter.
    Rhai,
    /// Boa, a bytecode JavaScript engine written in Rust.
    Boa,
    /// QuickJS through the `rquickjs` bindings.
    QuickJs,
}

impl EngineKind {
    pub const ALL: [EngineKind; 3] = [EngineKind::Rhai, EngineKind::Boa, EngineKind::QuickJs];

    pub fn name(self) -> &'static str {
        match self {
            Self::Rhai => "rhai",
            Self::Boa => "boa",
            Self::QuickJs => "quickjs",
        }
    }

    pub fn capabilities(self) -> Capabilities {
        match self {
            Self::Rhai => Capabilities {
                interrupt: true,
                shared_heap: false,
                memory_limit: false,
                late_binding: true,
            },
            Self::Boa => Capabilities {
                interrupt: false,
                shared_heap: false,
                memory_limit: false,
                late_binding: true,
            },
            Self::QuickJs => Capabilities {
                interrupt: true,
                shared_heap: true,
                memory_limit: true,
                late_binding: true,
            },
        }
    }
}

impl fmt::Display for EngineKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

impl FromStr for EngineKind {
    type Err = BridgeError;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        match value {
            "rhai" => Ok(Self::Rhai),
            "boa" => Ok(Self::Boa),
            "quickjs" => Ok(Self::QuickJs),
            other => Err(BridgeError::engine_init(format!(
                "unknown engine \"{}\"",
                other
            ))),
        }
    }
}

/// What an engine can honor. Callers check these instead of assuming every
/// engine behaves alike.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Capabilities {
    /// A running script can be stopped when its deadline passes.
    pub interrupt: bool,
    /// Contexts created from one shared runtime share one engine heap.
    pub shared_heap: bool,
    pub memory_limit: bool,
    /// New names may be bound after the first run.
    pub late_binding: bool,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ContextOptions {
    /// Wall-clock budget for each `run` or exported-function call.
    pub timeout: Option<Duration>,
    /// Heap limit in bytes.
    pub memory_limit: Option<usize>,
}

impl ContextOptions {
    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = Some(timeout);
        self
    }

    pub fn with_memory_limit(mut self, bytes: usize) -> Self {
        self.memory_limit = Some(bytes);
        self
    }

    /// Rejects options the engine cannot honor.
    pub fn validate_for(&self, kind: EngineKind) -> Result<(), BridgeError> {
        let capabilities = kind.capabilities();
        if self.timeout.is_some() && !capabilities.interrupt {
            return Err(BridgeError::engine_init(format!(
                "engine \"{}\" cannot interrupt a running script, so a timeout cannot be enforced",
                kind
            )));
        }
        if self.memory_limit.is_some() && !capabilities.memory_limit {
            return Err(BridgeError::engine_init(format!(
                "engine \"{}\" does not support a memory limit",
                kind
            )));
        }
        Ok(())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Mutability {
    ReadOnly,
    Mutable,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ContextState {
    Created,
    Bound,
    Executed,
    Closed,
}

#[cfg(test)]
mod types_tests {
    use super::*;
    use crate::error::ErrorKind;

    #[test]
    fn engine_kind_round_trips_through_its_name() {
        for kind in EngineKind::ALL {
            assert_eq!(kind.name().parse::<EngineKind>().expect("parse"), kind);
        }
        assert_eq!(
            "v8".parse::<EngineKind>().expect_err("unknown").kind,
            ErrorKind::EngineInit
        );
    }

    #[test]
    fn only_boa_lacks_interruption() {
        assert!(EngineKind::Rhai.capabilities().interrupt);
        assert!(!EngineKind::Boa.capabilities().interrupt);
        assert!(EngineKind::QuickJs.capabilities().interrupt);
    }

    #[test]
    fn options_are_checked_against_capabilities() {
        let timed = ContextOptions::default().with_timeout(Duration::from_millis(10));
        assert!(timed.validate_for(EngineKind::Rhai).is_ok());
        assert!(timed.validate_for(EngineKind::QuickJs).is_ok());
        assert_eq!(
            timed
                .validate_for(EngineKind::Boa)
                .expect_err("boa cannot interrupt")
                .kind,
            ErrorKind::EngineInit
        );

        let limited = ContextOptions::default().with_memory_limit(1 << 20);
        assert!(limited.validate_for(EngineKind::QuickJs).is_ok());
        assert!(limited.validate_for(EngineKind::Rhai).is_err());
    }
}
