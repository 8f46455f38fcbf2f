/// What the file system under the working tree can represent.
///
/// Checkout asks this instead of probing on its own so that callers can
/// inject fixed answers, for example in tests or from configuration.
pub trait FsCapabilities {
    fn supports_executable(&self) -> bool;

    fn supports_symlinks(&self) -> bool;
}

impl<T: FsCapabilities + ?Sized> FsCapabilities for &T {
    fn supports_executable(&self) -> bool {
        (**self).supports_executable()
    }

    fn supports_symlinks(&self) -> bool {
        (**self).supports_symlinks()
    }
}

impl<T: FsCapabilities + ?Sized> FsCapabilities for Box<T> {
    fn supports_executable(&self) -> bool {
        (**self).supports_executable()
    }

    fn supports_symlinks(&self) -> bool {
        (**self).supports_symlinks()
    }
}

/// The platform's own answers.
#[derive(Debug, Clone, Copy, Default)]
pub struct NativeFs;

impl FsCapabilities for NativeFs {
    fn supports_executable(&self) -> bool {
        cfg!(unix)
    }

    fn supports_symlinks(&self) -> bool {
        cfg!(unix)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FixedCapabilities {
    pub executable: bool,
    pub symlinks: bool,
}

impl FixedCapabilities {
    /// Neither executable bits nor symlinks.
    pub const MINIMAL: Self = Self {
        executable: false,
        symlinks: false,
    };
}

impl FsCapabilities for FixedCapabilities {
    fn supports_executable(&self) -> bool {
        self.executable
    }

    fn supports_symlinks(&self) -> bool {
        self.symlinks
    }
}

/// Applies `core.filemode` on top of another probe: when it is false the
/// executable bit is never written and only tracked in the index.
#[derive(Debug, Clone, Copy)]
pub struct FileModeOverride<C> {
    inner: C,
    filemode: bool,
}

impl<C: FsCapabilities> FileModeOverride<C> {
    pub fn new(inner: C, filemode: bool) -> Self {
        Self { inner, filemode }
    }
}

impl<C: FsCapabilities> FsCapabilities for FileModeOverride<C> {
    fn supports_executable(&self) -> bool {
        self.filemode && self.inner.supports_executable()
    }

    fn supports_symlinks(&self) -> bool {
        self.inner.supports_symlinks()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn filemode_false_hides_executable_support() {
        let full = FixedCapabilities {
            executable: true,
            symlinks: true,
        };
        let caps = FileModeOverride::new(full, false);
        assert!(!caps.supports_executable());
        assert!(caps.supports_symlinks());
        assert!(FileModeOverride::new(full, true).supports_executable());
        assert!(!FileModeOverride::new(FixedCapabilities::MINIMAL, true).supports_executable());
    }

    #[test]
    fn native_matches_platform() {
        assert_eq!(NativeFs.supports_executable(), cfg!(unix));
        let boxed: Box<dyn FsCapabilities> = Box::new(NativeFs);
        assert_eq!(boxed.supports_symlinks(), cfg!(unix));
    }
}
