// Portable Serialization
//
// The interoperable on-disk encoding. Two header variants, selected by a
// 32-bit cookie: bitmaps without run containers write the legacy cookie and
// a container count; bitmaps with run containers pack (count - 1) into the
// cookie's high half and follow it with a marker bitset flagging which
// containers are runs. Descriptors store (key, cardinality - 1) pairs; the
// offset table is elided for small run-flavored bitmaps. All payload words
// are little-endian. Deserialization validates every structural invariant
// and never yields a partial bitmap.

use std::io::{Read, Write};

use byteorder::{LittleEndian, ReadBytesExt, WriteBytesExt};
use tracing::warn;

use crate::container::array::ArrayContainer;
use crate::container::bitset::{BitsetContainer, BITSET_WORDS};
use crate::container::run::{Interval, RunContainer};
use crate::container::{Container, DEFAULT_MAX_SIZE};
use crate::error::{BitmapError, Result};
use crate::RoaringBitmap;

use super::store::ContainerStore;

pub const SERIAL_COOKIE_NO_RUNCONTAINER: u32 = 12346;
pub const SERIAL_COOKIE: u32 = 12347;
pub const NO_OFFSET_THRESHOLD: usize = 4;

/// Bytes per (key, cardinality - 1) descriptor.
const DESCRIPTION_BYTES: usize = 4;
/// Bytes per payload offset entry.
const OFFSET_BYTES: usize = 4;

impl RoaringBitmap {
    fn has_run_containers(&self) -> bool {
        self.store.containers.iter().any(Container::is_run)
    }

    fn header_size(&self) -> usize {
        let count = self.store.len();
        if self.has_run_containers() {
            let mut size = 4 + (count + 7) / 8 + count * DESCRIPTION_BYTES;
            if count >= NO_OFFSET_THRESHOLD {
                size += count * OFFSET_BYTES;
            }
            size
        } else {
            4 + 4 + count * (DESCRIPTION_BYTES + OFFSET_BYTES)
        }
    }

    /// Exact size of the portable encoding, computed upfront.
    pub fn portable_size_in_bytes(&self) -> usize {
        self.header_size()
            + self
                .store
                .containers
                .iter()
                .map(Container::size_in_bytes)
                .sum::<usize>()
    }

    /// Serialize into the portable format.
    pub fn portable_serialize(&self) -> Vec<u8> {
        let mut buffer = Vec::with_capacity(self.portable_size_in_bytes());
        self.portable_serialize_into(&mut buffer)
            .expect("writes to a Vec cannot fail");
        buffer
    }

    /// Serialize into the portable format through any writer.
    pub fn portable_serialize_into<W: Write>(&self, mut writer: W) -> Result<()> {
        let count = self.store.len();
        let has_run = self.has_run_containers();

        if has_run {
            writer.write_u32::<LittleEndian>(SERIAL_COOKIE | ((count as u32 - 1) << 16))?;
            let mut markers = vec![0u8; (count + 7) / 8];
            for (index, container) in self.store.containers.iter().enumerate() {
                if container.is_run() {
                    markers[index / 8] |= 1 << (index % 8);
                }
            }
            writer.write_all(&markers)?;
        } else {
            writer.write_u32::<LittleEndian>(SERIAL_COOKIE_NO_RUNCONTAINER)?;
            writer.write_u32::<LittleEndian>(count as u32)?;
        }

        for (index, &key) in self.store.keys.iter().enumerate() {
            writer.write_u16::<LittleEndian>(key)?;
            writer.write_u16::<LittleEndian>(
                (self.store.containers[index].cardinality() - 1) as u16,
            )?;
        }

        if !has_run || count >= NO_OFFSET_THRESHOLD {
            let mut offset = self.header_size() as u32;
            for container in &self.store.containers {
                writer.write_u32::<LittleEndian>(offset)?;
                offset += container.size_in_bytes() as u32;
            }
        }

        for container in &self.store.containers {
            match container.as_primitive() {
                Container::Array(array) => {
                    for value in array.iter() {
                        writer.write_u16::<LittleEndian>(value)?;
                    }
                }
                Container::Bitset(bitset) => {
                    for &word in bitset.words().iter() {
                        writer.write_u64::<LittleEndian>(word)?;
                    }
                }
                Container::Run(run) => {
                    writer.write_u16::<LittleEndian>(run.n_runs() as u16)?;
                    for interval in run.runs() {
                        writer.write_u16::<LittleEndian>(interval.start)?;
                        writer.write_u16::<LittleEndian>(interval.len)?;
                    }
                }
                Container::Shared(_) => unreachable!("shared containers never nest"),
            }
        }
        Ok(())
    }

    /// Deserialize from the portable format, validating every invariant.
    pub fn portable_deserialize(buffer: &[u8]) -> Result<Self> {
        Self::portable_deserialize_from(buffer)
    }

    /// Deserialize from the portable format through any reader.
    pub fn portable_deserialize_from<R: Read>(mut reader: R) -> Result<Self> {
        let cookie = reader.read_u32::<LittleEndian>()?;
        let (count, has_run) = if cookie == SERIAL_COOKIE_NO_RUNCONTAINER {
            (reader.read_u32::<LittleEndian>()? as usize, false)
        } else if cookie & 0xFFFF == SERIAL_COOKIE {
            ((cookie >> 16) as usize + 1, true)
        } else {
            warn!(cookie, "rejecting buffer with unknown serialization cookie");
            return Err(BitmapError::Serialization(format!(
                "unknown cookie value {cookie}"
            )));
        };
        if count > 1 << 16 {
            return Err(BitmapError::Serialization(format!(
                "container count {count} exceeds the key space"
            )));
        }

        let run_markers = if has_run {
            let mut markers = vec![0u8; (count + 7) / 8];
            reader.read_exact(&mut markers)?;
            Some(markers)
        } else {
            None
        };

        let mut keys = Vec::with_capacity(count);
        let mut cardinalities = Vec::with_capacity(count);
        for index in 0..count {
            let key = reader.read_u16::<LittleEndian>()?;
            if index > 0 && keys[index - 1] >= key {
                return Err(BitmapError::Serialization(format!(
                    "container keys not strictly increasing at index {index}"
                )));
            }
            keys.push(key);
            cardinalities.push(reader.read_u16::<LittleEndian>()? as u32 + 1);
        }

        if !has_run || count >= NO_OFFSET_THRESHOLD {
            // The offset table exists for forward seeks only; a linear
            // decode does not need it.
            let mut offsets = vec![0u8; count * OFFSET_BYTES];
            reader.read_exact(&mut offsets)?;
        }

        let mut store = ContainerStore::with_capacity(count);
        for index in 0..count {
            let cardinality = cardinalities[index];
            let is_run = run_markers
                .as_ref()
                .map_or(false, |markers| markers[index / 8] & (1 << (index % 8)) != 0);
            let container = if is_run {
                read_run_container(&mut reader, cardinality)?
            } else if cardinality as usize <= DEFAULT_MAX_SIZE {
                // The cardinality field, not the cookie, decides Array vs
                // Bitset.
                read_array_container(&mut reader, cardinality)?
            } else {
                read_bitset_container(&mut reader, cardinality)?
            };
            store.append(keys[index], container);
        }

        let mut bitmap = RoaringBitmap::new();
        bitmap.store = store;
        Ok(bitmap)
    }
}

fn read_array_container<R: Read>(reader: &mut R, cardinality: u32) -> Result<Container> {
    let mut values = Vec::with_capacity(cardinality as usize);
    for _ in 0..cardinality {
        values.push(reader.read_u16::<LittleEndian>()?);
    }
    if !values.windows(2).all(|w| w[0] < w[1]) {
        return Err(BitmapError::Serialization(
            "array container values not strictly increasing".into(),
        ));
    }
    Ok(Container::Array(ArrayContainer::from_sorted(values)))
}

fn read_bitset_container<R: Read>(reader: &mut R, cardinality: u32) -> Result<Container> {
    let mut words = Box::new([0u64; BITSET_WORDS]);
    for word in words.iter_mut() {
        *word = reader.read_u64::<LittleEndian>()?;
    }
    let popcount: u32 = words.iter().map(|w| w.count_ones()).sum();
    if popcount != cardinality {
        return Err(BitmapError::Serialization(format!(
            "bitset container popcount {popcount} disagrees with declared cardinality {cardinality}"
        )));
    }
    Ok(Container::Bitset(BitsetContainer::from_words(
        words,
        cardinality,
    )))
}

fn read_run_container<R: Read>(reader: &mut R, cardinality: u32) -> Result<Container> {
    let n_runs = reader.read_u16::<LittleEndian>()?;
    let mut runs: Vec<Interval> = Vec::with_capacity(n_runs as usize);
    let mut total = 0u64;
    for _ in 0..n_runs {
        let start = reader.read_u16::<LittleEndian>()?;
        let len = reader.read_u16::<LittleEndian>()?;
        if start as u32 + len as u32 > u16::MAX as u32 {
            return Err(BitmapError::Serialization(format!(
                "run ({start}, {len}) overflows the chunk"
            )));
        }
        if let Some(previous) = runs.last() {
            if start as u32 <= previous.end() + 1 {
                return Err(BitmapError::Serialization(
                    "run container intervals overlap or are adjacent".into(),
                ));
            }
        }
        runs.push(Interval::new(start, len));
        total += len as u64 + 1;
    }
    if total != cardinality as u64 {
        return Err(BitmapError::Serialization(format!(
            "run container cardinality {total} disagrees with declared cardinality {cardinality}"
        )));
    }
    Ok(Container::Run(RunContainer::from_intervals(runs)))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn mixed_bitmap() -> RoaringBitmap {
        let mut bitmap = RoaringBitmap::new();
        bitmap.add_range(0..0x9000);
        bitmap.add_range(0xA000..0x1_0000);
        bitmap.add(0x2_0000);
        bitmap.add(0x2_0005);
        for value in (0x8_0000..0x9_0000).step_by(2) {
            bitmap.add(value);
        }
        bitmap.run_optimize();
        bitmap
    }

    #[test]
    fn test_round_trip_mixed() {
        let bitmap = mixed_bitmap();
        let bytes = bitmap.portable_serialize();
        assert_eq!(bytes.len(), bitmap.portable_size_in_bytes());
        let decoded = RoaringBitmap::portable_deserialize(&bytes).unwrap();
        assert_eq!(decoded, bitmap);
        // Byte-exact round trip.
        assert_eq!(decoded.portable_serialize(), bytes);
    }

    #[test]
    fn test_round_trip_no_runs() {
        let bitmap = RoaringBitmap::from_values(&[1, 100, 0x1_0000, 0xFFFF_FFFF]);
        let bytes = bitmap.portable_serialize();
        assert_eq!(
            u32::from_le_bytes(bytes[0..4].try_into().unwrap()),
            SERIAL_COOKIE_NO_RUNCONTAINER
        );
        assert_eq!(bytes.len(), bitmap.portable_size_in_bytes());
        let decoded = RoaringBitmap::portable_deserialize(&bytes).unwrap();
        assert_eq!(decoded, bitmap);
    }

    #[test]
    fn test_run_cookie_layout() {
        let mut bitmap = RoaringBitmap::new();
        bitmap.add_range(10..20);
        bitmap.run_optimize();
        let bytes = bitmap.portable_serialize();
        let cookie = u32::from_le_bytes(bytes[0..4].try_into().unwrap());
        assert_eq!(cookie & 0xFFFF, SERIAL_COOKIE);
        assert_eq!(cookie >> 16, 0); // one container
        // cookie + 1 marker byte + 1 descriptor, no offsets below the
        // threshold, then the run payload.
        assert_eq!(bytes.len(), 4 + 1 + 4 + 2 + 4);
        let decoded = RoaringBitmap::portable_deserialize(&bytes).unwrap();
        assert_eq!(decoded, bitmap);
    }

    #[test]
    fn test_empty_round_trip() {
        let bitmap = RoaringBitmap::new();
        let bytes = bitmap.portable_serialize();
        assert_eq!(bytes.len(), 8);
        let decoded = RoaringBitmap::portable_deserialize(&bytes).unwrap();
        assert!(decoded.is_empty());
    }

    #[test]
    fn test_reject_unknown_cookie() {
        let bytes = 99999u32.to_le_bytes();
        assert!(RoaringBitmap::portable_deserialize(&bytes).is_err());
    }

    #[test]
    fn test_reject_truncated() {
        let bitmap = mixed_bitmap();
        let bytes = bitmap.portable_serialize();
        for cut in [2, 6, 12, bytes.len() - 1] {
            assert!(
                RoaringBitmap::portable_deserialize(&bytes[..cut]).is_err(),
                "truncation at {cut} must fail"
            );
        }
    }

    #[test]
    fn test_reject_unsorted_keys() {
        let a = RoaringBitmap::from_values(&[1]);
        let b = RoaringBitmap::from_values(&[0x1_0000]);
        let mut bytes = a.or(&b).portable_serialize();
        // Swap the two descriptor keys.
        bytes.swap(8, 12);
        bytes.swap(9, 13);
        assert!(RoaringBitmap::portable_deserialize(&bytes).is_err());
    }

    #[test]
    fn test_reject_bad_popcount() {
        let mut bitmap = RoaringBitmap::new();
        for value in 0..5000u32 {
            bitmap.add(value);
        }
        let mut bytes = bitmap.portable_serialize();
        // Flip one payload bit so the popcount disagrees.
        let last = bytes.len() - 1;
        bytes[last] ^= 0x40;
        assert!(RoaringBitmap::portable_deserialize(&bytes).is_err());
    }

    #[test]
    fn test_reject_overlapping_runs() {
        let mut bitmap = RoaringBitmap::new();
        bitmap.add_range(0..100);
        bitmap.add_range(200..300);
        bitmap.run_optimize();
        let mut bytes = bitmap.portable_serialize();
        let payload = bytes.len() - 10;
        // Rewrite the second run start to overlap the first.
        bytes[payload + 6] = 50;
        bytes[payload + 7] = 0;
        assert!(RoaringBitmap::portable_deserialize(&bytes).is_err());
    }
}
