use log::info;

use crate::error::{Error, Result};

/// Compute devices a trainer shards work across. Each device is a worker
/// thread spawned per call.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DeviceSet {
    count: usize,
}

impl DeviceSet {
    /// Claims `requested` devices from those available to this process.
    pub fn detect(requested: usize) -> Result<DeviceSet> {
        let available = std::thread::available_parallelism()
            .map(|n| n.get())
            .unwrap_or(0);
        info!("available devices: {available}");
        DeviceSet::claim(requested, available)
    }

    fn claim(requested: usize, available: usize) -> Result<DeviceSet> {
        if available == 0 || requested == 0 {
            return Err(Error::NoDevices);
        }
        if requested > available {
            return Err(Error::TooManyDevices { requested, available });
        }
        Ok(DeviceSet { count: requested })
    }

    /// A set of exactly `count` devices, without consulting the host.
    pub fn fixed(count: usize) -> Result<DeviceSet> {
        DeviceSet::claim(count, count)
    }

    pub fn count(&self) -> usize {
        self.count
    }

    /// Splits `items` into at most `count` contiguous, near-equal shards.
    pub fn shard<'a, T>(&self, items: &'a [T]) -> impl Iterator<Item = &'a [T]> {
        let chunk = items.len().div_ceil(self.count).max(1);
        items.chunks(chunk)
    }
}
