// External I/O operations module
pub mod dbus; // Sleep/resume and clock change monitoring
pub mod instance; // High-level instance management
pub mod lock; // Low-level lock file operations
pub mod signals; // Unix signal handling
