use crate::bson;
use crate::engine::page_address::PageAddress;
use crate::utils::BufferSlice;
use std::convert::Infallible;
use std::iter::Once;

/// Writes a logical byte stream into one or more page-backed [`BufferSlice`]
/// segments, advancing transparently across segment boundaries. Mirrors
/// [`crate::engine::buffer_reader::BufferReader`].
pub(crate) struct BufferWriter<'a, I> {
    slices: I,
    current: Option<&'a mut BufferSlice>,
    position_in_slice: usize,
    global_position: usize,
}

impl<'a> BufferWriter<'a, Once<&'a mut BufferSlice>> {
    pub fn single(slice: &'a mut BufferSlice) -> Self {
        Self::fragmented(std::iter::once(slice))
    }
}

impl<'a, I: Iterator<Item = &'a mut BufferSlice>> BufferWriter<'a, I> {
    pub fn fragmented(slices: impl IntoIterator<IntoIter = I>) -> Self {
        let mut slices = slices.into_iter();
        let current = slices.next();
        Self {
            slices,
            current,
            position_in_slice: 0,
            global_position: 0,
        }
    }

    pub fn write_document(&mut self, document: &bson::Document) {
        document.write_value(self).unwrap_or_else(|e| match e {});
    }

    pub(crate) fn write_array(&mut self, array: &bson::Array) {
        array.write_value(self).unwrap_or_else(|e| match e {});
    }
}

trait BufferOrSize: Copy {
    fn len(self) -> usize;
    fn is_empty(self) -> bool {
        self.len() == 0
    }
    fn split_at(self, mid: usize) -> (Self, Self);
    fn data(&self) -> Option<&[u8]>;
}

impl BufferOrSize for usize {
    fn len(self) -> usize {
        self
    }

    fn split_at(self, mid: usize) -> (Self, Self) {
        (mid, self - mid)
    }

    fn data(&self) -> Option<&[u8]> {
        None
    }
}

impl BufferOrSize for &[u8] {
    fn len(self) -> usize {
        <[u8]>::len(self)
    }

    fn split_at(self, mid: usize) -> (Self, Self) {
        <[u8]>::split_at(self, mid)
    }

    fn data(&self) -> Option<&[u8]> {
        Some(self)
    }
}

impl<'a, I: Iterator<Item = &'a mut BufferSlice>> BufferWriter<'a, I> {
    fn write_skip(&mut self, mut data: impl BufferOrSize) {
        while !data.is_empty() {
            let current = self.current.as_mut().expect("End of Stream");

            let current_remaining = current.len() - self.position_in_slice;

            if data.len() < current_remaining {
                if let Some(data) = data.data() {
                    current.write_bytes(self.position_in_slice, data);
                }
                self.position_in_slice += data.len();
                self.global_position += data.len();
                return;
            } else {
                let (to_current, next) = data.split_at(current_remaining);
                if let Some(to_current) = to_current.data() {
                    current.write_bytes(self.position_in_slice, to_current);
                }
                self.global_position += current_remaining;
                data = next;

                self.current = self.slices.next();
                self.position_in_slice = 0;
            }
        }
    }

    pub fn skip(&mut self, bytes: usize) {
        self.write_skip(bytes);
    }

    pub fn position(&self) -> usize {
        self.global_position
    }
}

impl<'a, I: Iterator<Item = &'a mut BufferSlice>> BufferWriter<'a, I> {
    fn write(&mut self, data: &[u8]) {
        self.write_skip(data);
    }

    pub fn write_i32(&mut self, value: i32) {
        self.write(&value.to_le_bytes());
    }

    pub fn write_u32(&mut self, value: u32) {
        self.write(&value.to_le_bytes());
    }

    pub fn write_u16(&mut self, value: u16) {
        self.write(&value.to_le_bytes());
    }

    pub fn write_u8(&mut self, value: u8) {
        self.write(&value.to_le_bytes());
    }

    pub fn write_i8(&mut self, value: i8) {
        self.write(&value.to_le_bytes());
    }

    pub fn write_i64(&mut self, value: i64) {
        self.write(&value.to_le_bytes());
    }

    pub fn write_u64(&mut self, value: u64) {
        self.write(&value.to_le_bytes());
    }

    pub fn write_f64(&mut self, value: f64) {
        self.write(&value.to_le_bytes());
    }

    pub fn write_bool(&mut self, value: bool) {
        self.write_u8(value as u8);
    }

    pub fn write_cstring(&mut self, value: &str) {
        debug_assert!(value.as_bytes().iter().all(|x| *x != 0));
        self.write(value.as_bytes());
        self.write(&[0]);
    }

    pub fn write_bytes(&mut self, value: &[u8]) {
        self.write(value);
    }

    pub fn write_page_address(&mut self, value: PageAddress) {
        self.write_u32(value.page_id());
        self.write_u8(value.index());
    }
}

impl<'a, I: Iterator<Item = &'a mut BufferSlice>> bson::BsonWriter for BufferWriter<'a, I> {
    type Error = Infallible;

    fn when_too_large(size: usize) -> Self::Error {
        panic!("the content size is too long ({size} bytes)");
    }

    fn write_bytes(&mut self, bytes: &[u8]) -> Result<(), Self::Error> {
        self.write_bytes(bytes);
        Ok(())
    }
}
