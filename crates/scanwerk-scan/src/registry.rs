// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// Per-session cache of option descriptors.
//
// Descriptors are fetched lazily and validated on the way in. A set that
// reports RELOAD_OPTIONS invalidates the whole cache, including the option
// count, and bumps the generation so holders of an older snapshot can tell.

use std::collections::BTreeMap;

use scanwerk_bridge::{DeviceBackend, RawHandle};
use scanwerk_core::codec;
use scanwerk_core::types::{Action, ValueType, WORD_SIZE};
use scanwerk_core::{OPTION_COUNT_INDEX, OptionDescriptor, OptionValue, Result, ScanwerkError};
use tracing::{debug, warn};

#[derive(Debug, Default)]
pub struct OptionRegistry {
    cache: BTreeMap<i32, OptionDescriptor>,
    count: Option<usize>,
    generation: u64,
}

impl OptionRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of options, the meta-option at index 0 included.
    pub fn count(&mut self, backend: &dyn DeviceBackend, handle: RawHandle) -> Result<usize> {
        if let Some(count) = self.count {
            return Ok(count);
        }
        let meta = self.fetch(backend, handle, OPTION_COUNT_INDEX)?;
        if meta.value_type != ValueType::Int {
            return Err(ScanwerkError::IoError(format!(
                "option count has type {:?}",
                meta.value_type
            )));
        }
        let mut buf = [0u8; WORD_SIZE];
        backend.control_option(handle, OPTION_COUNT_INDEX, Action::GetValue, &mut buf)?;
        let count = match codec::decode(&buf, ValueType::Int, WORD_SIZE)? {
            OptionValue::Int(n) if n >= 1 => n as usize,
            other => {
                return Err(ScanwerkError::IoError(format!("implausible option count {other}")));
            }
        };
        debug!(count, "option count read");
        self.count = Some(count);
        Ok(count)
    }

    /// Descriptor of option `index`.
    pub fn describe(
        &mut self,
        backend: &dyn DeviceBackend,
        handle: RawHandle,
        index: i32,
    ) -> Result<&OptionDescriptor> {
        let count = self.count(backend, handle)?;
        if index < 0 || index as usize >= count {
            return Err(ScanwerkError::InvalidOption(index));
        }
        self.fetch(backend, handle, index)
    }

    /// Index of the option called `name`. Groups have no name and are
    /// never matched.
    pub fn find_by_name(
        &mut self,
        backend: &dyn DeviceBackend,
        handle: RawHandle,
        name: &str,
    ) -> Result<i32> {
        if name.is_empty() {
            return Err(ScanwerkError::NotFound(String::new()));
        }
        let count = self.count(backend, handle)? as i32;
        for index in 1..count {
            if self.fetch(backend, handle, index)?.name == name {
                return Ok(index);
            }
        }
        Err(ScanwerkError::NotFound(name.to_owned()))
    }

    /// Fetch every descriptor now. Returns the option count.
    pub fn prewarm(&mut self, backend: &dyn DeviceBackend, handle: RawHandle) -> Result<usize> {
        let count = self.count(backend, handle)?;
        for index in 0..count as i32 {
            self.fetch(backend, handle, index)?;
        }
        Ok(count)
    }

    /// All descriptors in index order.
    pub fn descriptors(
        &mut self,
        backend: &dyn DeviceBackend,
        handle: RawHandle,
    ) -> Result<impl Iterator<Item = &OptionDescriptor>> {
        self.prewarm(backend, handle)?;
        Ok(self.cache.values())
    }

    /// Drop every cached descriptor and the count.
    pub fn invalidate(&mut self) {
        self.cache.clear();
        self.count = None;
        self.generation += 1;
        debug!(generation = self.generation, "option registry invalidated");
    }

    /// Bumped on every invalidation.
    pub fn generation(&self) -> u64 {
        self.generation
    }

    pub fn cached(&self) -> usize {
        self.cache.len()
    }

    fn fetch(
        &mut self,
        backend: &dyn DeviceBackend,
        handle: RawHandle,
        index: i32,
    ) -> Result<&OptionDescriptor> {
        if !self.cache.contains_key(&index) {
            let descriptor = backend
                .option_descriptor(handle, index)
                .ok_or(ScanwerkError::InvalidOption(index))?;
            if descriptor.index != index {
                warn!(index, reported = descriptor.index, "descriptor index mismatch");
            }
            descriptor.check_shape()?;
            self.cache.insert(index, descriptor);
        }
        self.cache.get(&index).ok_or(ScanwerkError::InvalidOption(index))
    }
}
