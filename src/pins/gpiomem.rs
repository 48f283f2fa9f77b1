use std::ffi::CString;
use std::fs;
use std::io;
use std::os::unix::io::{
	FromRawFd,
};
use std::ptr;
use std::time::Duration;

use libc::{
	MAP_SHARED,
	O_CLOEXEC,
	O_RDWR,
	O_SYNC,
	PROT_READ,
	PROT_WRITE,
	c_void,
	mmap,
	munmap,
	open,
};

use super::{
	Direction,
	Line,
	PinDriver,
	PinLayout,
	busy_wait,
};

#[allow(dead_code)]
mod consts {
	// the character device reports size 0; the GPIO block is one page
	pub const MAP_LEN: usize = 4096;

	// byte offsets, "BCM2835 ARM Peripherals" chapter 6
	pub const GPFSEL0: usize = 0x00;
	pub const GPSET0: usize = 0x1c;
	pub const GPCLR0: usize = 0x28;
	pub const GPLEV0: usize = 0x34;
	pub const GPPUD: usize = 0x94;
	pub const GPPUDCLK0: usize = 0x98;

	pub const FSEL_INPUT: u32 = 0b000;
	pub const FSEL_OUTPUT: u32 = 0b001;

	pub const PUD_OFF: u32 = 0b00;
	pub const PUD_DOWN: u32 = 0b01;

	// "wait 150 cycles" for the pull control signal; generous on any clock
	pub const PUD_SETUP: std::time::Duration = std::time::Duration::from_micros(5);
}

use self::consts::*;

pub struct Bcm2835Gpio {
	ptr: ptr::NonNull<u8>,
	layout: PinLayout,
}

impl Drop for Bcm2835Gpio {
	fn drop(&mut self) {
		unsafe {
			let res = munmap(
				self.ptr.as_ptr() as *mut c_void,
				MAP_LEN,
			);
			if 0 != res {
				error!("munmap failed: {}", io::Error::last_os_error());
			}
		}
	}
}

impl Bcm2835Gpio {
	pub fn layout(&self) -> &PinLayout {
		&self.layout
	}

	fn read_reg(&self, offset: usize) -> u32 {
		assert!(offset & 3 == 0);
		assert!(offset + 3 < MAP_LEN);
		unsafe { ptr::read_volatile(self.ptr.as_ptr().add(offset) as *const u32) }
	}

	fn write_reg(&mut self, offset: usize, data: u32) {
		assert!(offset & 3 == 0);
		assert!(offset + 3 < MAP_LEN);
		unsafe { ptr::write_volatile(self.ptr.as_ptr().add(offset) as *mut u32, data) }
	}

	fn gpio(&self, line: Line) -> crate::AResult<u8> {
		match self.layout.gpio(line) {
			Some(gpio) => Ok(gpio),
			None => bail!("line {} is not wired in the pin layout", line),
		}
	}

	// (register offset, bit) in a bank of one-bit-per-GPIO registers
	fn bank(base: usize, gpio: u8) -> (usize, u32) {
		(base + 4 * (gpio as usize / 32), 1u32 << (gpio % 32))
	}

	fn set_function(&mut self, gpio: u8, function: u32) {
		let offset = GPFSEL0 + 4 * (gpio as usize / 10);
		let shift = 3 * (gpio as u32 % 10);
		let value = self.read_reg(offset);
		self.write_reg(offset, (value & !(0b111 << shift)) | (function << shift));
	}

	fn set_pull(&mut self, gpio: u8, pull: u32) {
		let (clk_reg, bit) = Self::bank(GPPUDCLK0, gpio);
		self.write_reg(GPPUD, pull);
		busy_wait(PUD_SETUP);
		self.write_reg(clk_reg, bit);
		busy_wait(PUD_SETUP);
		self.write_reg(GPPUD, 0);
		self.write_reg(clk_reg, 0);
	}
}

impl PinDriver for Bcm2835Gpio {
	fn set_line(&mut self, line: Line, high: bool) -> crate::AResult<()> {
		let gpio = self.gpio(line)?;
		let (reg, bit) = Self::bank(if high { GPSET0 } else { GPCLR0 }, gpio);
		self.write_reg(reg, bit);
		Ok(())
	}

	fn set_direction(&mut self, line: Line, direction: Direction) -> crate::AResult<()> {
		let gpio = self.gpio(line)?;
		match direction {
			Direction::Output => {
				self.set_function(gpio, FSEL_OUTPUT);
			},
			Direction::Input => {
				self.set_function(gpio, FSEL_INPUT);
				self.set_pull(gpio, PUD_OFF);
			},
			Direction::InputPullDown => {
				self.set_function(gpio, FSEL_INPUT);
				self.set_pull(gpio, PUD_DOWN);
			},
		}
		Ok(())
	}

	fn read_line(&mut self, line: Line) -> crate::AResult<bool> {
		let gpio = self.gpio(line)?;
		let (reg, bit) = Self::bank(GPLEV0, gpio);
		Ok(0 != self.read_reg(reg) & bit)
	}

	fn delay(&mut self, duration: Duration) {
		busy_wait(duration);
	}
}

// TODO: exclusive open / file locking?
pub fn open_gpiomem(path: &str, layout: PinLayout) -> crate::AResult<Bcm2835Gpio> {
	layout.validate()?;

	with_context!(("couldn't map GPIO registers from {}", path), {
		let path = CString::new(path)?;

		let fd = unsafe { open(path.as_ptr(), O_RDWR | O_CLOEXEC | O_SYNC) };
		if -1 == fd {
			return Err(io::Error::last_os_error().into());
		}
		// now get fd managed to prevent resource leak; mapping stays valid after close
		let _f = unsafe { fs::File::from_raw_fd(fd) };

		let area = unsafe {
			mmap(
				ptr::null_mut(),
				MAP_LEN,
				PROT_READ | PROT_WRITE,
				MAP_SHARED,
				fd,
				0,
			)
		};

		if area as usize == !0usize {
			return Err(io::Error::last_os_error().into());
		}
		match ptr::NonNull::new(area as *mut u8) {
			None => bail!("mmap returned NULL"),
			Some(area) => {
				debug!("mapped GPIO block from {:?}", path);
				Ok(Bcm2835Gpio {
					ptr: area,
					layout,
				})
			},
		}
	})
}

#[cfg(test)]
mod tests {
	use super::*;

	#[test]
	fn bank_registers() {
		assert_eq!(Bcm2835Gpio::bank(GPSET0, 4), (GPSET0, 1 << 4));
		assert_eq!(Bcm2835Gpio::bank(GPCLR0, 28), (GPCLR0, 1 << 28));
		assert_eq!(Bcm2835Gpio::bank(GPLEV0, 33), (GPLEV0 + 4, 1 << 1));
	}

	#[test]
	fn missing_device_fails() {
		let err = open_gpiomem("/nonexistent/gpiomem", PinLayout::default()).err().unwrap();
		assert!(err.to_string().contains("/nonexistent/gpiomem"));
	}
}
