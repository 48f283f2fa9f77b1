use super::Line;

const GPIO_COUNT: u8 = 54;

/// BCM GPIO numbers of the programmer board
#[derive(Clone, Copy, PartialEq, Eq, Hash, Debug)]
pub struct PinLayout {
	pub shift_data: u8,
	pub shift_latch: u8,
	pub shift_clock: u8,
	pub chip_enable: u8,
	pub output_enable: u8,
	pub write_enable: u8,
	/// DQ0; DQ1..DQ7 follow on consecutive GPIOs
	pub data_base: u8,
	pub led: Option<u8>,
}

impl Default for PinLayout {
	fn default() -> Self {
		PinLayout {
			shift_data: 2,
			shift_latch: 3,
			shift_clock: 4,
			chip_enable: 26,
			output_enable: 27,
			write_enable: 28,
			data_base: 8,
			led: Some(25),
		}
	}
}

impl PinLayout {
	pub fn gpio(&self, line: Line) -> Option<u8> {
		Some(match line {
			Line::ShiftData => self.shift_data,
			Line::ShiftClock => self.shift_clock,
			Line::ShiftLatch => self.shift_latch,
			Line::ChipEnable => self.chip_enable,
			Line::WriteEnable => self.write_enable,
			Line::OutputEnable => self.output_enable,
			Line::Data(n) => {
				assert!(n < 8);
				return self.data_base.checked_add(n);
			},
			Line::Led => return self.led,
		})
	}

	/// every GPIO used, in `Line` order
	pub fn all_gpios(&self) -> Vec<(Line, u8)> {
		let mut lines = vec![
			Line::ShiftData,
			Line::ShiftClock,
			Line::ShiftLatch,
			Line::ChipEnable,
			Line::WriteEnable,
			Line::OutputEnable,
		];
		lines.extend_from_slice(&Line::DATA);
		lines.push(Line::Led);
		lines.into_iter()
			.filter_map(|line| self.gpio(line).map(|gpio| (line, gpio)))
			.collect()
	}

	/// fails if two lines share a GPIO or a GPIO doesn't exist on the SoC
	pub fn validate(&self) -> crate::AResult<()> {
		ensure!(self.data_base <= GPIO_COUNT - 8,
			"DQ0 mapped to GPIO{}, but DQ7 needs GPIO{} and there are only {} GPIOs",
			self.data_base, self.data_base as u16 + 7, GPIO_COUNT
		);
		let all = self.all_gpios();
		for (i, &(line, gpio)) in all.iter().enumerate() {
			ensure!(gpio < GPIO_COUNT, "{} mapped to GPIO{}, but there are only {} GPIOs", line, gpio, GPIO_COUNT);
			if let Some(&(other, _)) = all[..i].iter().find(|&&(_, g)| g == gpio) {
				bail!("GPIO{} used for both {} and {}", gpio, other, line);
			}
		}
		Ok(())
	}
}
