// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// Device enumeration.
//
// Every call asks the library afresh; identities are copied out, so the
// returned list stays valid after the next enumeration.

use scanwerk_core::{DeviceIdentity, Result, ScanwerkError};
use tracing::{debug, info, instrument};

use crate::runtime::Runtime;

/// Lists the devices a runtime can reach.
#[derive(Debug, Clone)]
pub struct DeviceDirectory {
    runtime: Runtime,
}

impl DeviceDirectory {
    pub fn new(runtime: Runtime) -> Self {
        Self { runtime }
    }

    /// Currently available devices. `local_only` skips network backends.
    #[instrument(skip(self))]
    pub fn enumerate(&self, local_only: bool) -> Result<Vec<DeviceIdentity>> {
        let devices = self.runtime.backend().get_devices(local_only)?;
        info!(count = devices.len(), "devices enumerated");
        for d in &devices {
            debug!(name = %d.name, vendor = %d.vendor, model = %d.model, kind = %d.kind, "device");
        }
        Ok(devices)
    }

    /// Identity of the device called `name`.
    pub fn find(&self, name: &str) -> Result<DeviceIdentity> {
        self.enumerate(false)?
            .into_iter()
            .find(|d| d.name == name)
            .ok_or_else(|| ScanwerkError::NotFound(name.to_owned()))
    }

    pub fn runtime(&self) -> &Runtime {
        &self.runtime
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use scanwerk_bridge::{EmulatedBackend, EmulatedDevice};
    use scanwerk_core::Status;

    use super::*;

    fn backend() -> Arc<EmulatedBackend> {
        Arc::new(EmulatedBackend::new(vec![
            EmulatedDevice::new("test:0"),
            EmulatedDevice::new("net:lab:0")
                .vendor("Acme", "NetScan 9", "sheetfed scanner")
                .remote(),
        ]))
    }

    fn directory() -> DeviceDirectory {
        Runtime::init(backend(), None).unwrap().directory()
    }

    #[test]
    fn enumerates_all_devices() {
        let devices = directory().enumerate(false).unwrap();
        let names: Vec<_> = devices.iter().map(|d| d.name.as_str()).collect();
        assert_eq!(names, ["test:0", "net:lab:0"]);
    }

    #[test]
    fn transport_failure_is_io_error() {
        let backend = backend();
        let directory = Runtime::init(backend.clone(), None).unwrap().directory();
        backend.fail_enumeration(Some(Status::IoError));
        assert!(matches!(directory.enumerate(false), Err(ScanwerkError::IoError(_))));
        assert!(matches!(directory.find("test:0"), Err(ScanwerkError::IoError(_))));

        backend.fail_enumeration(None);
        assert_eq!(directory.enumerate(false).unwrap().len(), 2);
    }

    #[test]
    fn local_only_filters_network_devices() {
        let devices = directory().enumerate(true).unwrap();
        assert_eq!(devices.len(), 1);
        assert_eq!(devices[0].name, "test:0");
    }

    #[test]
    fn find_reports_missing_devices() {
        let dir = directory();
        assert_eq!(dir.find("net:lab:0").unwrap().vendor, "Acme");
        assert!(matches!(dir.find("usb:9"), Err(ScanwerkError::NotFound(n)) if n == "usb:9"));
    }
}
