use embedded_storage::{ReadStorage, Storage};
use esp_println::println;
use esp_storage::FlashStorage;

const BOOT_RECORD_MAGIC: u32 = 0x5343_4E31; // "SCN1"
const BOOT_RECORD_VERSION: u8 = 1;
const BOOT_RECORD_LEN: usize = 12;

/// Boot counter persisted in the last flash sector.
///
/// A corrupt or incompatible record is rewritten from scratch once; only a
/// flash I/O failure is surfaced, and the caller treats it as fatal to
/// startup.
pub(crate) struct BootStore<'d> {
    flash: FlashStorage<'d>,
    offset: u32,
}

impl<'d> BootStore<'d> {
    pub(crate) fn new(flash_peripheral: esp_hal::peripherals::FLASH<'d>) -> Self {
        let flash = FlashStorage::new(flash_peripheral).multicore_auto_park();
        let capacity = flash.capacity() as u32;
        let offset = capacity.saturating_sub(FlashStorage::SECTOR_SIZE);
        Self { flash, offset }
    }

    pub(crate) fn open_and_bump(&mut self) -> Result<u32, &'static str> {
        let mut record = [0u8; BOOT_RECORD_LEN];
        self.flash
            .read(self.offset, &mut record)
            .map_err(|_| "boot store read failed")?;

        let count = match decode_boot_count(&record) {
            Some(previous) => previous.wrapping_add(1),
            None => {
                println!("boot: store record invalid; reinitializing");
                1
            }
        };

        let record = encode_boot_record(count);
        self.flash
            .write(self.offset, &record)
            .map_err(|_| "boot store write failed")?;
        Ok(count)
    }
}

fn decode_boot_count(record: &[u8; BOOT_RECORD_LEN]) -> Option<u32> {
    if record.iter().all(|&byte| byte == 0xFF) {
        // Erased sector, first boot.
        return None;
    }
    if u32::from_le_bytes([record[0], record[1], record[2], record[3]]) != BOOT_RECORD_MAGIC {
        return None;
    }
    if record[4] != BOOT_RECORD_VERSION {
        return None;
    }
    let expected = checksum8(&record[..BOOT_RECORD_LEN - 1]);
    if record[BOOT_RECORD_LEN - 1] != expected {
        return None;
    }
    Some(u32::from_le_bytes([
        record[5], record[6], record[7], record[8],
    ]))
}

fn encode_boot_record(count: u32) -> [u8; BOOT_RECORD_LEN] {
    let mut record = [0xFFu8; BOOT_RECORD_LEN];
    record[0..4].copy_from_slice(&BOOT_RECORD_MAGIC.to_le_bytes());
    record[4] = BOOT_RECORD_VERSION;
    record[5..9].copy_from_slice(&count.to_le_bytes());
    record[BOOT_RECORD_LEN - 1] = checksum8(&record[..BOOT_RECORD_LEN - 1]);
    record
}

fn checksum8(bytes: &[u8]) -> u8 {
    let mut acc = 0x5Au8;
    for &byte in bytes {
        acc ^= byte.rotate_left(1);
    }
    acc
}
