// SPDX-License-Identifier: Apache-2.0 OR MIT
// Logging macros for convenient logging

/// Log a message with error severity
///
/// # Examples
/// ```ignore
/// log_error!(logger, Facility::MacFilter, "filter programming failed");
/// ```
#[macro_export]
macro_rules! log_error {
    ($logger:expr, $facility:expr, $($arg:tt)*) => {
        $logger.error($facility, &format!($($arg)*))
    };
}

/// Log a message with warning severity
///
/// # Examples
/// ```ignore
/// log_warning!(logger, Facility::Reconcile, "filter table near capacity");
/// ```
#[macro_export]
macro_rules! log_warning {
    ($logger:expr, $facility:expr, $($arg:tt)*) => {
        $logger.warning($facility, &format!($($arg)*))
    };
}

/// Log a message with notice severity
///
/// # Examples
/// ```ignore
/// log_notice!(logger, Facility::Mld, "entering MLDv1 compatibility mode");
/// ```
#[macro_export]
macro_rules! log_notice {
    ($logger:expr, $facility:expr, $($arg:tt)*) => {
        $logger.notice($facility, &format!($($arg)*))
    };
}

/// Log a message with info severity
///
/// # Examples
/// ```ignore
/// log_info!(logger, Facility::Reconcile, "joined group {}", group);
/// ```
#[macro_export]
macro_rules! log_info {
    ($logger:expr, $facility:expr, $($arg:tt)*) => {
        $logger.info($facility, &format!($($arg)*))
    };
}

/// Log a message with debug severity
///
/// # Examples
/// ```ignore
/// log_debug!(logger, Facility::Mld, "report timer armed for {}", group);
/// ```
#[macro_export]
macro_rules! log_debug {
    ($logger:expr, $facility:expr, $($arg:tt)*) => {
        $logger.debug($facility, &format!($($arg)*))
    };
}
