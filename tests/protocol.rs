extern crate sst39sf_flash;

use std::io::Cursor;

use sst39sf_flash::bus::{
	AddressShifter,
	BusController,
	BusMode,
	Timing,
};
use sst39sf_flash::chip::CommandSequencer;
use sst39sf_flash::engine::{
	self,
	Mismatch,
};
use sst39sf_flash::sim::SimulatedBus;
use sst39sf_flash::source::{
	ReaderSource,
	SliceSource,
	open_file_source,
};
use sst39sf_flash::status::MemoryStatus;
use sst39sf_flash::Config;

fn board(address_lines: u8) -> BusController<SimulatedBus> {
	BusController::new(SimulatedBus::new(address_lines), address_lines, Timing::datasheet()).unwrap()
}

fn pattern(len: usize) -> Vec<u8> {
	(0..len).map(|i| (i * 31 + i / 256) as u8).collect()
}

#[test]
fn written_bytes_read_back() {
	let mut bus = board(19);
	bus.enter_write_mode().unwrap();
	let writes = [(0x00000, 0x12), (0x05555, 0x00), (0x2aaaa, 0xa5), (0x7ffff, 0x7e)];
	for &(address, data) in &writes {
		bus.write_byte_unlocked(address, data).unwrap();
	}
	bus.enter_read_mode().unwrap();
	for &(address, data) in &writes {
		assert_eq!(bus.read_byte(address).unwrap(), data, "address 0x{:05x}", address);
	}
	assert_eq!(bus.pins().dropped_cycles(), 0);
	assert!(!bus.pins().contention());
}

#[test]
fn every_byte_value_reads_back() {
	let mut bus = board(19);
	bus.enter_write_mode().unwrap();
	for b in 0..=255u8 {
		bus.write_byte_unlocked(0x7ff00 + b as u32, b).unwrap();
	}
	bus.enter_read_mode().unwrap();
	for b in 0..=255u8 {
		assert_eq!(bus.read_byte(0x7ff00 + b as u32).unwrap(), b);
	}
	assert_eq!(bus.pins().programmed_bytes(), 256);
	assert_eq!(bus.pins().dropped_cycles(), 0);
}

#[test]
fn erase_then_whole_chip_reads_erased() {
	let mut bus = board(19);
	for b in bus.pins_mut().memory_mut().iter_mut() {
		*b = 0x5a;
	}
	let mut status = MemoryStatus::default();
	engine::erase_chip(&mut bus, &mut status).unwrap();
	let result = engine::verify_erased(&mut bus, &mut status).unwrap();
	assert_eq!(result.end, 1 << 19);
	assert_eq!(result.errors(), 0);
	assert!(status.contains("Num errors: 0"));
}

#[test]
fn program_then_verify_is_clean() {
	let mut bus = board(17);
	let data = pattern(5000);
	let mut status = MemoryStatus::default();
	let written = engine::program(&mut bus, &mut SliceSource::new(&data, 1024), &mut status).unwrap();
	assert_eq!(written, 5000);
	let result = engine::verify_against_source(&mut bus, &mut SliceSource::new(&data, 1024), &mut status).unwrap();
	assert_eq!(result.end, 5000);
	assert!(result.is_ok());
}

#[test]
fn corrupted_byte_is_the_only_mismatch() {
	let mut bus = board(17);
	let data = [0x00, 0xff, 0x3c, 0x3c, 0x01];
	let mut status = MemoryStatus::default();
	engine::program(&mut bus, &mut SliceSource::new(&data, 1024), &mut status).unwrap();
	bus.pins_mut().corrupt(2, 0x00);

	let result = engine::verify_against_source(&mut bus, &mut SliceSource::new(&data, 1024), &mut status).unwrap();
	assert_eq!(result.end, 5);
	assert_eq!(result.mismatches, vec![Mismatch { address: 2, expected: 0x3c, actual: 0x00 }]);
	assert!(status.contains("Error! Byte mismatch"));
	assert_eq!(status.last().unwrap()[2], "Num errors: 1");
}

#[test]
fn chain_presents_shifted_address() {
	let mut sim = SimulatedBus::new(19);
	let shifter = AddressShifter::new(19, Timing::datasheet().settle);
	for &address in &[0, 0x7ffff, 0x00001, 0x40000, 0x2aaaa, 0x15555, 0x5555] {
		shifter.shift(&mut sim, address).unwrap();
		assert_eq!(sim.address(), address);
	}
}

#[test]
fn same_address_latches_same_register() {
	let mut sim = SimulatedBus::new(19);
	let shifter = AddressShifter::new(19, Timing::datasheet().settle);
	for &address in &[0x2aaaa, 0x7ffff, 0] {
		shifter.shift(&mut sim, address).unwrap();
		let first = sim.latched();
		shifter.shift(&mut sim, address).unwrap();
		assert_eq!(sim.latched(), first, "address 0x{:05x}", address);

		// a different address in between leaves nothing behind
		shifter.shift(&mut sim, address ^ 0x15555).unwrap();
		shifter.shift(&mut sim, address).unwrap();
		assert_eq!(sim.latched(), first, "address 0x{:05x}", address);
	}
}

#[test]
fn reader_source_exact_chunk_multiple() {
	let mut bus = board(17);
	let data = pattern(2048);
	let mut status = MemoryStatus::default();
	let written = engine::program(&mut bus, &mut ReaderSource::new(Cursor::new(data.clone()), 1024), &mut status).unwrap();
	assert_eq!(written, 2048);
	let result = engine::verify_against_source(&mut bus, &mut ReaderSource::new(Cursor::new(data), 1024), &mut status).unwrap();
	assert_eq!(result.end, 2048);
	assert!(result.is_ok());
	assert_eq!(bus.mode(), BusMode::Read);
}

#[test]
fn flash_file_with_default_config() {
	let data = pattern(3333);
	let path = std::env::temp_dir().join(format!("sst39sf-flash-test-{}.bin", std::process::id()));
	std::fs::write(&path, &data).unwrap();

	let config = Config {
		timing: Timing::datasheet(),
		..Config::default()
	};
	let mut sim = SimulatedBus::new(config.geometry.address_lines);
	for b in sim.memory_mut()[..4096].iter_mut() {
		*b = 0x00;
	}
	let mut bus = config.open_bus(sim).unwrap();
	let mut status = MemoryStatus::default();
	let report = engine::flash(&mut bus, || open_file_source(&path, config.chunk_size), &mut status).unwrap();
	std::fs::remove_file(&path).unwrap();

	assert!(report.is_ok());
	assert_eq!(report.erase.end, 1 << 19);
	assert_eq!(report.written, 3333);
	assert_eq!(&bus.pins().memory()[..3333], &data[..]);
	assert_eq!(bus.pins().memory()[3333], 0xff);
}
