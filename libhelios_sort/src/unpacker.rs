use super::bitfield::{channel_id, data_value, popcount16, BitfieldReader, RawEvent};
use super::channel_map::ChannelRemapper;
use super::constants::{END_OF_EVENT, NUMBER_OF_ADCS};
use super::error::UnpackError;
use super::event::{AuxReadout, DetectorData, HitRecord, UnpackedEvent};
use super::variant::EventLayout;

/// EventUnpacker walks the body of a triggered event and remaps the ADC hits onto the array.
///
/// An event body is laid out as
///
/// ```text
/// aux word x layout.aux_words
/// time word x layout.time_words
/// ADC0 hit pattern, ADC0 data x popcount(pattern)
/// ...
/// ADC4 hit pattern, ADC4 data x popcount(pattern)
/// 0x0000dead
/// ```
#[derive(Debug)]
pub struct EventUnpacker<'a> {
    remapper: &'a ChannelRemapper,
    layout: EventLayout,
}

impl<'a> EventUnpacker<'a> {
    pub fn new(remapper: &'a ChannelRemapper, layout: EventLayout) -> Self {
        Self { remapper, layout }
    }

    /// Unpack an event into a fresh detector array
    pub fn unpack(&self, event: &RawEvent) -> Result<UnpackedEvent, UnpackError> {
        let mut unpacked = UnpackedEvent::default();
        let (aux, hits) = self.unpack_into(event, &mut unpacked.data)?;
        unpacked.aux = aux;
        unpacked.hits = hits;
        Ok(unpacked)
    }

    /// Unpack an event into a caller-owned detector array.
    ///
    /// The array is zeroed first. If an ADC block turns out to be truncated the blocks
    /// before it remain written, and it is up to the caller to throw the array away.
    pub fn unpack_into(
        &self,
        event: &RawEvent,
        data: &mut DetectorData,
    ) -> Result<(AuxReadout, Vec<HitRecord>), UnpackError> {
        data.clear();
        // The trailer is not a data word
        let words = event.words();
        let body = match words.split_last() {
            Some((&END_OF_EVENT, body)) => body,
            _ => words,
        };
        let mut reader = BitfieldReader::new(body);

        let mut aux = AuxReadout {
            aux: Vec::with_capacity(self.layout.aux_words),
            time: Vec::with_capacity(self.layout.time_words),
        };
        for _ in 0..self.layout.aux_words {
            aux.aux.push(data_value(reader.next_word()?));
        }
        for _ in 0..self.layout.time_words {
            aux.time.push(data_value(reader.next_word()?));
        }

        let mut hits: Vec<HitRecord> = Vec::new();
        for adc in 0..NUMBER_OF_ADCS {
            let n_hits = popcount16(reader.next_word()?) as usize;
            if n_hits > reader.remaining() {
                return Err(UnpackError::TruncatedEvent {
                    adc,
                    declared: n_hits,
                    remaining: reader.remaining(),
                });
            }
            for _ in 0..n_hits {
                let word = reader.next_word()?;
                let hit = HitRecord {
                    adc,
                    channel: channel_id(word),
                    value: data_value(word),
                };
                if let Some(target) = self.remapper.resolve(adc, hit.channel as usize) {
                    data.write(target, hit.value as f32);
                }
                hits.push(hit);
            }
        }

        if let Some(word) = reader.peek_word() {
            spdlog::debug!(
                "Event has {} unexpected trailing words, starting with {:#010x}",
                reader.remaining(),
                word
            );
        }

        Ok((aux, hits))
    }
}
