use crate::bus::{
	BusController,
	Timing,
};
use crate::chip::Geometry;
use crate::pins::{
	PinDriver,
	PinLayout,
};
use crate::source::CHUNK_SIZE;

/// everything about the board and the chip a run needs
#[derive(Clone, Copy, PartialEq, Eq, Debug)]
pub struct Config {
	pub layout: PinLayout,
	pub timing: Timing,
	pub geometry: Geometry,
	pub chunk_size: usize,
}

impl Default for Config {
	fn default() -> Self {
		Config {
			layout: PinLayout::default(),
			timing: Timing::default(),
			geometry: Geometry::default(),
			chunk_size: CHUNK_SIZE,
		}
	}
}

impl Config {
	pub fn validate(&self) -> crate::AResult<()> {
		self.layout.validate()?;
		ensure!(self.chunk_size > 0, "chunk size must not be zero");
		ensure!(
			self.geometry.address_lines >= 15 && self.geometry.address_lines <= 24,
			"{} address lines not supported (need 15 for the command addresses, at most 24)",
			self.geometry.address_lines
		);
		Ok(())
	}

	/// set up the bus on `pins` (chip selected, idle)
	pub fn open_bus<P: PinDriver>(&self, pins: P) -> crate::AResult<BusController<P>> {
		self.validate()?;
		BusController::new(pins, self.geometry.address_lines, self.timing)
	}
}

#[cfg(test)]
mod tests {
	use super::*;
	use crate::bus::BusMode;
	use crate::chip::ChipType;
	use crate::sim::SimulatedBus;

	#[test]
	fn defaults_match_reference_board() {
		let config = Config::default();
		assert_eq!(config.geometry.address_lines, 19);
		assert_eq!(config.chunk_size, 1024);
		assert_eq!(config.timing.erase_cycle, std::time::Duration::from_secs(1));
		config.validate().unwrap();
	}

	#[test]
	fn open_bus_uses_geometry() {
		let config = Config {
			geometry: ChipType::Sst39sf010a.into(),
			..Config::default()
		};
		let bus = config.open_bus(SimulatedBus::new(17)).unwrap();
		assert_eq!(bus.address_lines(), 17);
		assert_eq!(bus.mode(), BusMode::Idle);
	}

	#[test]
	fn too_few_address_lines() {
		let config = Config {
			geometry: Geometry { address_lines: 12 },
			..Config::default()
		};
		assert!(config.validate().is_err());
	}
}
