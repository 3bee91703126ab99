//! The ordered binary checkpoint contract.
//!
//! Every checkpointable object writes each field's binary representation in
//! a fixed order via fixed-size little-endian primitives, and reads them
//! back in the same order. This is a write-every-field-in-order contract,
//! not a schema: field ordering must never change without issuing a new
//! stream magic number. Collections are preceded by their length, which is
//! validated against an upper bound on read.

use std::io::{Read, Write};

use crate::error::{Result, SimError};
use crate::time::SimTime;
use crate::util::rng::LocalRng;

/// Upper bound on serialized collection lengths; larger values indicate a
/// corrupt stream.
pub const MAX_LIST_LEN: u64 = 100_000_000;

pub trait Checkpoint {
    fn write_ckpt(&self, w: &mut dyn Write) -> Result<()>;
    fn read_ckpt(&mut self, r: &mut dyn Read) -> Result<()>;
}

fn read_exact(r: &mut dyn Read, buf: &mut [u8]) -> Result<()> {
    r.read_exact(buf)
        .map_err(|_| SimError::checkpoint("short read"))
}

macro_rules! impl_checkpoint_le {
    ($($t:ty),*) => {$(
        impl Checkpoint for $t {
            fn write_ckpt(&self, w: &mut dyn Write) -> Result<()> {
                w.write_all(&self.to_le_bytes())?;
                Ok(())
            }
            fn read_ckpt(&mut self, r: &mut dyn Read) -> Result<()> {
                let mut buf = [0u8; std::mem::size_of::<$t>()];
                read_exact(r, &mut buf)?;
                *self = <$t>::from_le_bytes(buf);
                Ok(())
            }
        }
    )*};
}

impl_checkpoint_le!(u8, i32, u32, i64, u64, u128, f64);

impl Checkpoint for bool {
    fn write_ckpt(&self, w: &mut dyn Write) -> Result<()> {
        (*self as u8).write_ckpt(w)
    }
    fn read_ckpt(&mut self, r: &mut dyn Read) -> Result<()> {
        let mut b = 0u8;
        b.read_ckpt(r)?;
        *self = b != 0;
        Ok(())
    }
}

impl Checkpoint for usize {
    fn write_ckpt(&self, w: &mut dyn Write) -> Result<()> {
        (*self as u64).write_ckpt(w)
    }
    fn read_ckpt(&mut self, r: &mut dyn Read) -> Result<()> {
        let mut v = 0u64;
        v.read_ckpt(r)?;
        validate_list_len(v)?;
        *self = v as usize;
        Ok(())
    }
}

impl Checkpoint for SimTime {
    fn write_ckpt(&self, w: &mut dyn Write) -> Result<()> {
        self.in_days().write_ckpt(w)
    }
    fn read_ckpt(&mut self, r: &mut dyn Read) -> Result<()> {
        let mut d = 0i32;
        d.read_ckpt(r)?;
        *self = SimTime::from_days(d);
        Ok(())
    }
}

impl<T: Checkpoint + Default> Checkpoint for Vec<T> {
    fn write_ckpt(&self, w: &mut dyn Write) -> Result<()> {
        (self.len() as u64).write_ckpt(w)?;
        for item in self {
            item.write_ckpt(w)?;
        }
        Ok(())
    }
    fn read_ckpt(&mut self, r: &mut dyn Read) -> Result<()> {
        let mut len = 0u64;
        len.read_ckpt(r)?;
        validate_list_len(len)?;
        self.clear();
        self.reserve(len as usize);
        for _ in 0..len {
            let mut item = T::default();
            item.read_ckpt(r)?;
            self.push(item);
        }
        Ok(())
    }
}

impl Checkpoint for LocalRng {
    fn write_ckpt(&self, w: &mut dyn Write) -> Result<()> {
        let (seed, stream, word_pos) = self.state();
        w.write_all(&seed)?;
        stream.write_ckpt(w)?;
        word_pos.write_ckpt(w)?;
        Ok(())
    }
    fn read_ckpt(&mut self, r: &mut dyn Read) -> Result<()> {
        let mut seed = [0u8; 32];
        read_exact(r, &mut seed)?;
        let mut stream = 0u64;
        stream.read_ckpt(r)?;
        let mut word_pos = 0u128;
        word_pos.read_ckpt(r)?;
        *self = LocalRng::from_state(seed, stream, word_pos);
        Ok(())
    }
}

pub fn validate_list_len(len: u64) -> Result<()> {
    if len > MAX_LIST_LEN {
        return Err(SimError::checkpoint(format!("list length out of range: {len}")));
    }
    Ok(())
}

/// Implements `Checkpoint` for a struct by writing the named fields in
/// order. The field list is part of the stream contract.
#[macro_export]
macro_rules! impl_checkpoint {
    ($ty:ty : $($field:ident),+ $(,)?) => {
        impl $crate::util::checkpoint::Checkpoint for $ty {
            fn write_ckpt(
                &self,
                w: &mut dyn ::std::io::Write,
            ) -> $crate::error::Result<()> {
                $( $crate::util::checkpoint::Checkpoint::write_ckpt(&self.$field, w)?; )+
                Ok(())
            }
            fn read_ckpt(
                &mut self,
                r: &mut dyn ::std::io::Read,
            ) -> $crate::error::Result<()> {
                $( $crate::util::checkpoint::Checkpoint::read_ckpt(&mut self.$field, r)?; )+
                Ok(())
            }
        }
    };
}
