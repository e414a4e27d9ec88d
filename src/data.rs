//! Traits and impls used to read/write data to/from the register images.

use core::{
	marker::PhantomData,
	fmt,
	};

/**
	trait for data types that can be packed/unpacked to/from a register image

	The hardware registers are little endian, every implementor must follow this byte order.
*/
pub trait Register: Sized {
    /// byte size of the packed value
    const LEN: usize;

    /// write the value in the first [Self::LEN] bytes of `dst`
    fn pack(&self, dst: &mut [u8]);
    /// read the value from the first [Self::LEN] bytes of `src`
    fn unpack(src: &[u8]) -> Self;
}

impl Register for bool {
	const LEN: usize = 1;

	fn pack(&self, dst: &mut [u8])  {
        dst[0] = if *self {0b1} else {0b0};
	}
	fn unpack(src: &[u8]) -> Self  {
		src[0] & 0b1 == 0b1
	}
}

/// macro implementing [Register] for numeric types
macro_rules! num_register {
	($t: ty) => { impl crate::data::Register for $t {
            const LEN: usize = core::mem::size_of::<$t>();

            fn pack(&self, dst: &mut [u8]) {
				dst[.. Self::LEN].copy_from_slice(&self.to_le_bytes());
			}
			fn unpack(src: &[u8]) -> Self {
                let mut bytes = [0; core::mem::size_of::<$t>()];
                bytes.copy_from_slice(&src[.. Self::LEN]);
				Self::from_le_bytes(bytes)
			}
		}};
}

num_register!(u8);
num_register!(u16);
num_register!(u32);
num_register!(u64);
num_register!(i8);
num_register!(i16);
num_register!(i32);
num_register!(i64);

/// macro implementing [Register] for a struct generated with `bilge`, going through the integer the struct is built on
macro_rules! bilge_register {
    ($t: ty, $id: ty) => { impl crate::data::Register for $t {
        const LEN: usize = core::mem::size_of::<$id>();

        fn pack(&self, dst: &mut [u8]) {
            <$id as crate::data::Register>::pack(&<$id>::from(*self), dst)
        }
        fn unpack(src: &[u8]) -> Self {
            Self::from(<$id as crate::data::Register>::unpack(src))
        }
    }};
}
pub(crate) use bilge_register;


/**
	locate some data in a register window by its byte position and length, which must be extracted to type `T` to be processed in rust

	It acts like a getter/setter of a value in a byte sequence. One can think of it as an offset to a data location because it does not actually point the data but only its offset in the byte sequence, it also contains its length to dynamically check memory bounds.
*/
#[derive(Default, Eq, Hash)]
pub struct Field<T: Register> {
    /// this is only here to mark that T is actually used
	extracted: PhantomData<T>,
	/// start byte index of the object
	pub byte: usize,
	/// byte length of the object
	pub len: usize,
}
impl<T: Register> Field<T>
{
	/// build a Field from its byte offset and byte length
	pub const fn new(byte: usize, len: usize) -> Self {
		Self{extracted: PhantomData, byte, len}
	}
	/// build a Field from its byte offset, infering its length from the data nominal size
	pub const fn simple(byte: usize) -> Self {
        Self{extracted: PhantomData, byte, len: T::LEN}
	}
	/// build a Field pointing the 32 bit word at the given word index
	pub const fn word(index: usize) -> Self {
        Self::simple(index * WORD)
	}
	/// byte just after the object
	pub const fn end(&self) -> usize {self.byte + self.len}

	/// extract the value pointed by the field in the given byte array
	pub fn get(&self, data: &[u8]) -> T       {
		T::unpack(&data[self.byte..][..self.len])
	}
	/// dump the given value to the place pointed by the field in the byte array
	pub fn set(&self, data: &mut [u8], value: T)   {
        value.pack(&mut data[self.byte..][..self.len])
	}
}
impl<T: Register> fmt::Debug for Field<T> {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		write!(f, "Field{{0x{:x}, {}}}", self.byte, self.len)
	}
}
// [Clone] and [Copy] must be implemented manually to allow copying a field pointing to a type which does not implement this operation
impl<T: Register> Clone for Field<T> {
    fn clone(&self) -> Self   {Self::new(self.byte, self.len)}
}
impl<T: Register> Copy for Field<T> {}
impl<T: Register> PartialEq for Field<T> {
    fn eq(&self, other: &Self) -> bool {
        self.byte == other.byte && self.len == other.len
    }
}

/// byte size of a hardware register word
pub const WORD: usize = core::mem::size_of::<u32>();

