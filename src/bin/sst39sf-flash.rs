#[macro_use]
extern crate clap;
#[macro_use]
extern crate failure;
#[macro_use]
extern crate log;

extern crate sst39sf_flash;
use sst39sf_flash::*;

use std::fs;
use std::process::exit;

use failure::Fail;

use sst39sf_flash::bus::{
	BusController,
	Timing,
};
use sst39sf_flash::chip::{
	ChipType,
	Geometry,
};
use sst39sf_flash::engine::VerificationResult;
use sst39sf_flash::pins::{
	PinDriver,
	PinLayout,
	open_gpiomem,
};
use sst39sf_flash::sim::SimulatedBus;
use sst39sf_flash::source::{
	ReaderSource,
	open_file_source,
};
use sst39sf_flash::status::{
	BlinkLed,
	FatalSignal,
	LogFatal,
	LogStatus,
};

const DEFAULT_GPIOMEM: &str = "/dev/gpiomem";

const EXIT_ERROR: i32 = 1;
const EXIT_MISMATCH: i32 = 2;

fn get_param<T>(matches: &clap::ArgMatches, name: &str) -> AResult<Option<T>>
where
	T: std::str::FromStr,
	failure::Error: From<<T as std::str::FromStr>::Err>,
{
	let param = match matches.value_of(name) {
		Some(p) => p,
		None => return Ok(None),
	};
	param.parse::<T>().map(Some).map_err(|e| {
		let e = failure::Error::from(e);
		let msg = format!("invalid parameter {}: {}", name, e);
		e.context(msg).into()
	})
}

fn config_from(matches: &clap::ArgMatches) -> AResult<Config> {
	let mut layout = PinLayout::default();
	let pins: Vec<(&str, &mut u8)> = vec![
		("data", &mut layout.shift_data),
		("latch", &mut layout.shift_latch),
		("clock", &mut layout.shift_clock),
		("ce", &mut layout.chip_enable),
		("oe", &mut layout.output_enable),
		("we", &mut layout.write_enable),
		("d0", &mut layout.data_base),
	];
	for (name, pin) in pins {
		if let Some(gpio) = get_param::<u8>(matches, name)? {
			*pin = gpio;
		}
	}
	if matches.is_present("no_led") {
		layout.led = None;
	} else if let Some(gpio) = get_param::<u8>(matches, "led")? {
		layout.led = Some(gpio);
	}

	let chip: ChipType = get_param(matches, "chip")?.unwrap_or_default();
	let timing = if matches.is_present("datasheet_timing") {
		Timing::datasheet()
	} else {
		Timing::default()
	};

	let config = Config {
		layout,
		timing,
		geometry: Geometry::from(chip),
		chunk_size: get_param(matches, "chunk_size")?.unwrap_or(Config::default().chunk_size),
	};
	config.validate()?;
	info!("{} ({} KiB), {:?}", chip, config.geometry.size() / 1024, config.timing);
	Ok(config)
}

fn exit_code(result: &VerificationResult) -> i32 {
	if result.is_ok() { 0 } else { EXIT_MISMATCH }
}

// the source must exist and fit before anything touches the chip
fn open_checked(path: &str, config: &Config) -> AResult<ReaderSource<fs::File>> {
	let len = fs::metadata(path).map_err(|e| {
		let msg = format!("couldn't stat source file {:?}: {}", path, e);
		failure::Error::from(e.context(msg))
	})?.len();
	ensure!(len <= config.geometry.size() as u64,
		"source file {:?} has {} bytes, chip only {}", path, len, config.geometry.size()
	);
	open_file_source(path, config.chunk_size)
}

fn fatal<P: PinDriver>(bus: &mut BusController<P>, e: failure::Error) -> i32 {
	BlinkLed::new(bus.pins_mut()).on_fatal(&format!("Error: {}", e));
	EXIT_ERROR
}

fn run<P: PinDriver>(matches: &clap::ArgMatches, config: &Config, pins: P) -> AResult<i32> {
	let mut bus = config.open_bus(pins)?;
	let mut status = LogStatus;

	match matches.subcommand() {
		("program", Some(sub_m)) => {
			let path = sub_m.value_of("FILE").unwrap_or_default();
			let mut source = match open_checked(path, config) {
				Ok(s) => s,
				Err(e) => return Ok(fatal(&mut bus, e)),
			};
			let written = engine::program(&mut bus, &mut source, &mut status)?;
			info!("wrote {} bytes from {:?}; run verify before trusting the chip", written, path);
			Ok(0)
		},
		("verify", Some(sub_m)) => {
			let path = sub_m.value_of("FILE").unwrap_or_default();
			let mut source = match open_checked(path, config) {
				Ok(s) => s,
				Err(e) => return Ok(fatal(&mut bus, e)),
			};
			let result = engine::verify_against_source(&mut bus, &mut source, &mut status)?;
			Ok(exit_code(&result))
		},
		("erase", _) => {
			engine::erase_chip(&mut bus, &mut status)?;
			Ok(0)
		},
		("verify_erased", _) => {
			let result = engine::verify_erased(&mut bus, &mut status)?;
			Ok(exit_code(&result))
		},
		("flash", Some(sub_m)) => {
			let path = sub_m.value_of("FILE").unwrap_or_default();
			if let Err(e) = open_checked(path, config) {
				return Ok(fatal(&mut bus, e));
			}
			let report = engine::flash(&mut bus, || open_checked(path, config), &mut status)?;
			match report.verify {
				None => {
					error!("chip didn't erase ({} bytes not 0xff), nothing written", report.erase.errors());
					Ok(EXIT_MISMATCH)
				},
				Some(ref verify) => {
					info!("wrote {} bytes, {} mismatches", report.written, verify.errors());
					Ok(exit_code(verify))
				},
			}
		},
		("", _) => bail!("no subcommand"),
		(cmd, _) => bail!("not implemented subcommand {:?}", cmd),
	}
}

fn main_app() -> AResult<i32> {
	let matches = clap_app!(@app (app_from_crate!())
		(@setting SubcommandRequiredElseHelp)
		(@arg chip: --chip +takes_value "chip type: 39SF010A, 39SF020A or 39SF040 (default)")
		(@arg datasheet_timing: --datasheet_timing "use datasheet minimum delays instead of the conservative defaults")
		(@arg chunk_size: --chunk_size +takes_value "bytes read from the source at a time (default 1024)")
		(@arg simulate: --simulate "run against an in-memory simulated chip instead of the GPIOs")
		(@arg gpiomem: --gpiomem +takes_value "GPIO register device (default /dev/gpiomem)")
		(@arg data: --data +takes_value "GPIO of the shift register serial input (default 2)")
		(@arg latch: --latch +takes_value "GPIO of the shift register latch (default 3)")
		(@arg clock: --clock +takes_value "GPIO of the shift register clock (default 4)")
		(@arg ce: --ce +takes_value "GPIO of /CE (default 26)")
		(@arg oe: --oe +takes_value "GPIO of /OE (default 27)")
		(@arg we: --we +takes_value "GPIO of /WE (default 28)")
		(@arg d0: --d0 +takes_value "GPIO of DQ0; DQ1..DQ7 follow (default 8)")
		(@arg led: --led +takes_value "GPIO of the status LED (default 25)")
		(@arg no_led: --no_led "no status LED wired")
		(@subcommand program =>
			(about: "program FILE into the chip from address 0 (chip must be erased)")
			(@arg FILE: +required "image to write")
		)
		(@subcommand verify =>
			(about: "compare the chip against FILE")
			(@arg FILE: +required "image to compare with")
		)
		(@subcommand erase =>
			(about: "erase the whole chip")
		)
		(@subcommand verify_erased =>
			(about: "check every byte of the chip reads 0xff")
		)
		(@subcommand flash =>
			(about: "erase, check erase, program FILE and verify")
			(@arg FILE: +required "image to write")
		)
	).get_matches();

	let config = config_from(&matches)?;

	if matches.is_present("simulate") {
		info!("using simulated chip");
		return run(&matches, &config, SimulatedBus::new(config.geometry.address_lines));
	}

	let path = matches.value_of("gpiomem").unwrap_or(DEFAULT_GPIOMEM);
	let gpio = match open_gpiomem(path, config.layout) {
		Ok(gpio) => gpio,
		Err(e) => {
			LogFatal.on_fatal(&format!("Error: {}", e));
			return Ok(EXIT_ERROR);
		},
	};
	run(&matches, &config, gpio)
}

fn main() {
	env_logger::from_env(env_logger::Env::default().default_filter_or("info")).init();

	match main_app() {
		Ok(code) => exit(code),
		Err(e) => {
			error!("Error: {}", e);
			exit(EXIT_ERROR);
		},
	}
}
