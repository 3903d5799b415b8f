// Compiler configuration consumed by the middle end.
// Input-only: the driver folds command-line options and pragma
// directives into this before IR generation starts.

bitflags::bitflags! {
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
    pub struct CompilerTraits: u32 {
        const MAKE_PACKAGE  = 1 << 0;
        const DEBUG_SYMBOLS = 1 << 1;
        const NO_WARN       = 1 << 2;
        const NO_UNDEF      = 1 << 3;
        /// Disable runtime type information entirely
        const NO_TYPEINFO   = 1 << 4;
        const UNSAFE_META   = 1 << 5;
        const UNSAFE_NEW    = 1 << 6;
        /// Promote warnings to errors
        const FUSSY         = 1 << 7;
        const FORCE_STDLIB  = 1 << 8;
    }
}

bitflags::bitflags! {
    /// Runtime checks the backend should instrument
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
    pub struct Checks: u32 {
        const NULL_CHECKS   = 1 << 0;
        const LEAK_CHECKS   = 1 << 1;
        const BOUNDS_CHECKS = 1 << 2;
    }
}

/// Cross-compilation target
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Target {
    #[default]
    Host,
    Windows,
    MacOs,
    Linux,
}

#[derive(Debug, Clone, Copy, Default)]
pub struct CompilerConfig {
    pub traits: CompilerTraits,
    pub checks: Checks,
    /// 0-3
    pub optimization: u8,
    pub target: Target,
}

impl CompilerConfig {
    pub fn rtti_enabled(&self) -> bool {
        !self.traits.contains(CompilerTraits::NO_TYPEINFO)
    }

    pub fn null_checks(&self) -> bool {
        self.checks.contains(Checks::NULL_CHECKS)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_rtti_gate() {
        let mut config = CompilerConfig::default();
        assert!(config.rtti_enabled());

        config.traits |= CompilerTraits::NO_TYPEINFO;
        assert!(!config.rtti_enabled());
    }
}
