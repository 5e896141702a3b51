//! Platform-specific implementations of the process control port

#[cfg(windows)]
pub mod windows;

#[cfg(unix)]
pub mod unix;

/// Process control back-end for the current platform
#[cfg(windows)]
pub type NativeControl = self::windows::WindowsControl;

/// Process control back-end for the current platform
#[cfg(unix)]
pub type NativeControl = self::unix::UnixControl;
