//! Bit-packed provider categories.

use bitflags::bitflags;

use crate::error::ContractError;

bitflags! {
	/// A provider category, or an OR of several — also used as a watch mask
	/// and as a context's `watched_aggregate`/`callback_flag_aggregate`-adjacent
	/// bookkeeping field.
	#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
	pub struct Provider: u32 {
		/// No provider; the Global Context's permanent value.
		const NONE = 0;
		const CRYPTO = 1 << 0;
		const FSEVENT = 1 << 1;
		const FS = 1 << 2;
		const GETADDRINFO = 1 << 3;
		const PIPE = 1 << 4;
		const PROCESS = 1 << 5;
		const QUERY = 1 << 6;
		const SHUTDOWN = 1 << 7;
		const SIGNAL = 1 << 8;
		const STATWATCHER = 1 << 9;
		const TCP = 1 << 10;
		const TIMER = 1 << 11;
		const TLS = 1 << 12;
		const TTY = 1 << 13;
		const UDP = 1 << 14;
		const ZLIB = 1 << 15;
		/// Sentinel for scheduler-originated contexts with no native category.
		/// All bits set, so it intersects every watch mask including `NONE`'s
		/// complement checks; see [`Provider::watches`].
		const TICK = 0xFFFF_FFFF;
	}
}

/// The watch mask a freshly constructed listener gets when the caller
/// doesn't specify one and the `default_watch_mask_all` feature is enabled:
/// the low 28 bits set, matching the default every categorized provider (and
/// a reserve of uncategorized ones) falls within, but not `TICK`. Bits 16-27
/// aren't backed by a named flag today, so `from_bits_retain` is used rather
/// than `from_bits_truncate`, which would silently drop them.
pub const DEFAULT_WATCH_MASK: Provider = Provider::from_bits_retain(0x0FFF_FFFF);

const NAME_TABLE: &[(&str, Provider)] = &[
	("NONE", Provider::NONE),
	("CRYPTO", Provider::CRYPTO),
	("FSEVENT", Provider::FSEVENT),
	("FS", Provider::FS),
	("GETADDRINFO", Provider::GETADDRINFO),
	("PIPE", Provider::PIPE),
	("PROCESS", Provider::PROCESS),
	("QUERY", Provider::QUERY),
	("SHUTDOWN", Provider::SHUTDOWN),
	("SIGNAL", Provider::SIGNAL),
	("STATWATCHER", Provider::STATWATCHER),
	("TCP", Provider::TCP),
	("TIMER", Provider::TIMER),
	("TLS", Provider::TLS),
	("TTY", Provider::TTY),
	("UDP", Provider::UDP),
	("ZLIB", Provider::ZLIB),
	("TICK", Provider::TICK),
];

impl Provider {
	/// Looks up a single provider by its canonical, case-sensitive name.
	///
	/// # Errors
	///
	/// Returns a [`ContractError`] if `name` isn't one of the recognised
	/// provider names.
	pub fn from_name(name: &str) -> Result<Provider, ContractError> {
		NAME_TABLE
			.iter()
			.find(|(n, _)| *n == name)
			.map(|(_, p)| *p)
			.ok_or_else(|| ContractError::new(format!("unrecognised provider name: {name:?}")))
	}

	/// The canonical name for a single-bit provider value. `None` for `Provider::empty()`
	/// combinations of more than one bit, or for `NONE`/unrecognised bits.
	#[must_use]
	pub fn name(self) -> Option<&'static str> {
		NAME_TABLE.iter().find(|(_, p)| *p == self).map(|(n, _)| *n)
	}

	/// Whether this mask (used as a watch mask or aggregate) intersects `provider`.
	#[must_use]
	pub fn watches(self, provider: Provider) -> bool {
		self.intersects(provider)
	}
}
