use byteorder::{ByteOrder, BigEndian};
use Error;

#[macro_export]
macro_rules! clamp {
    ( $a:expr, $min:expr, $max:expr ) => {
        if $a < $min {
            $a = $min
        } else if $a > $max {
            $a = $max
        }
    }
}

// sign-extend the low nibble of a byte into -8..7
pub fn signed_nibble(b: u8) -> i8 {
    let n = (b & 0x0f) as i8;
    if n > 7 { n - 16 } else { n }
}


pub trait BinaryRead {
    fn read_string(&self, ofs: usize, size: usize) -> Result<String, Error>;
    fn read16b(&self, ofs: usize) -> Result<u16, Error>;
    fn read8(&self, ofs: usize) -> Result<u8, Error>;
    fn slice(&self, start: usize, size: usize) -> Result<&[u8], Error>;
}

impl<'a> BinaryRead for &'a [u8] {
    fn read_string(&self, ofs: usize, size: usize) -> Result<String, Error> {
        check_buffer_size(&self, ofs + size)?;
        Ok(String::from_utf8_lossy(&self[ofs..ofs+size]).to_string().replace("\x00", " "))
    }

    fn read16b(&self, ofs: usize) -> Result<u16, Error> {
        check_buffer_size(&self, ofs + 2)?;
        Ok(BigEndian::read_u16(&self[ofs..ofs+2]))
    }

    fn read8(&self, ofs: usize) -> Result<u8, Error> {
        check_buffer_size(&self, ofs + 1)?;
        Ok(self[ofs])
    }

    fn slice(&self, start: usize, size: usize) -> Result<&[u8], Error> {
        check_buffer_size(&self, start + size)?;
        Ok(&self[start..start + size])
    }
}

fn check_buffer_size(b: &[u8], end: usize) -> Result<(), Error> {
    if end > b.len() {
        return Err(Error::Load(format!("short read (want {} bytes, have {})", end, b.len())))
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_signed_nibble() {
        assert_eq!(signed_nibble(0), 0);
        assert_eq!(signed_nibble(7), 7);
        assert_eq!(signed_nibble(8), -8);
        assert_eq!(signed_nibble(15), -1);
        // high nibble is ignored
        assert_eq!(signed_nibble(0xf8), -8);
        assert_eq!(signed_nibble(0x37), 7);
    }

    #[test]
    fn test_read16b() {
        let b: &[u8] = &[0x12, 0x34, 0xff];
        assert_eq!(b.read16b(0).unwrap(), 0x1234);
        assert_eq!(b.read16b(1).unwrap(), 0x34ff);
        assert!(b.read16b(2).is_err());
    }

    #[test]
    fn test_read_string() {
        let b: &[u8] = &[b'a', b'b', 0, b'c'];
        assert_eq!(b.read_string(0, 4).unwrap(), "ab c");
        assert!(b.read_string(2, 4).is_err());
    }

    #[test]
    fn test_slice() {
        let b: &[u8] = &[1, 2, 3, 4];
        assert_eq!(b.slice(1, 2).unwrap(), &[2, 3]);
        assert!(b.slice(3, 2).is_err());
    }
}
