//! ESC/POS command builder
//!
//! Buffers text and command bytes for one kitchen ticket.

use crate::encoding::{convert_to_single_byte, text_width};

const ESC: u8 = 0x1B;
const GS: u8 = 0x1D;

/// ESC/POS ticket builder
///
/// Text is buffered as UTF-8 and transcoded to the printer's single-byte
/// code page in [`EscPosBuilder::build`]; command bytes pass through as-is.
pub struct EscPosBuilder {
    buf: Vec<u8>,
    width: usize,
}

impl EscPosBuilder {
    /// Start a ticket (ESC @) for paper `width` characters wide
    ///
    /// 58mm paper holds 32 characters, 80mm paper 48.
    pub fn new(width: usize) -> Self {
        let mut buf = Vec::with_capacity(512);
        buf.extend_from_slice(&[ESC, b'@']);
        Self { buf, width }
    }

    pub fn text(&mut self, s: &str) -> &mut Self {
        self.buf.extend_from_slice(s.as_bytes());
        self
    }

    pub fn line(&mut self, s: &str) -> &mut Self {
        self.text(s);
        self.buf.push(b'\n');
        self
    }

    pub fn newline(&mut self) -> &mut Self {
        self.buf.push(b'\n');
        self
    }

    /// Bare line feeds, used before the cut so the last line clears the blade
    pub fn blank_lines(&mut self, lines: usize) -> &mut Self {
        self.buf.extend(std::iter::repeat_n(b'\n', lines));
        self
    }

    /// ESC a 1
    pub fn center(&mut self) -> &mut Self {
        self.buf.extend_from_slice(&[ESC, b'a', 0x01]);
        self
    }

    /// ESC a 0
    pub fn left(&mut self) -> &mut Self {
        self.buf.extend_from_slice(&[ESC, b'a', 0x00]);
        self
    }

    /// ESC E 1
    pub fn bold(&mut self) -> &mut Self {
        self.buf.extend_from_slice(&[ESC, b'E', 0x01]);
        self
    }

    /// ESC E 0
    pub fn bold_off(&mut self) -> &mut Self {
        self.buf.extend_from_slice(&[ESC, b'E', 0x00]);
        self
    }

    /// Full-width rule of `=`
    pub fn sep_double(&mut self) -> &mut Self {
        self.line(&"=".repeat(self.width))
    }

    /// Full-width rule of `-`
    pub fn sep_single(&mut self) -> &mut Self {
        self.line(&"-".repeat(self.width))
    }

    /// `left` flush left and `right` flush right on one line
    ///
    /// When both do not fit they are separated by a single space.
    pub fn line_lr(&mut self, left: &str, right: &str) -> &mut Self {
        let used = text_width(left) + text_width(right);
        let gap = if used >= self.width {
            1
        } else {
            self.width - used
        };

        self.text(left);
        self.text(&" ".repeat(gap));
        self.line(right)
    }

    /// Partial cut (GS V 1)
    pub fn cut(&mut self) -> &mut Self {
        self.buf.extend_from_slice(&[GS, b'V', 0x01]);
        self
    }

    /// Finish the ticket, transcoded to the single-byte code page
    pub fn build(self) -> Vec<u8> {
        convert_to_single_byte(&self.buf)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_builder_starts_with_init() {
        let data = EscPosBuilder::new(32).build();
        assert_eq!(data, vec![0x1B, 0x40]);
    }

    #[test]
    fn test_header_sequence() {
        let mut b = EscPosBuilder::new(32);
        b.center().bold().line("Table: 5").bold_off().left();

        let data = b.build();
        let mut expected = vec![0x1B, 0x40, 0x1B, 0x61, 0x01, 0x1B, 0x45, 0x01];
        expected.extend_from_slice(b"Table: 5\n");
        expected.extend_from_slice(&[0x1B, 0x45, 0x00, 0x1B, 0x61, 0x00]);
        assert_eq!(data, expected);
    }

    #[test]
    fn test_line_lr() {
        let mut b = EscPosBuilder::new(20);
        b.line_lr("Total:", "7.00");
        b.line_lr("Crème brûlée x1", "12.50");

        let data = b.build();
        let mut expected = b"Total:          7.00\n".to_vec();
        expected.extend_from_slice(b"Cr\xE8me br\xFBl\xE9e x1 12.50\n");
        assert_eq!(&data[2..], expected.as_slice());
    }

    #[test]
    fn test_separators() {
        let mut b = EscPosBuilder::new(10);
        b.sep_single().sep_double();

        let data = b.build();
        assert_eq!(&data[2..], b"----------\n==========\n");
    }

    #[test]
    fn test_cut_is_last() {
        let mut b = EscPosBuilder::new(10);
        b.blank_lines(2).cut();

        let data = b.build();
        assert!(data.ends_with(&[b'\n', b'\n', 0x1D, 0x56, 0x01]));
    }
}
