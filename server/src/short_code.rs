// PasteGate Reference Paste Service
// Copyright (C) 2021  Edward Shen
//
// This program is free software: you can redistribute it and/or modify
// it under the terms of the GNU Affero General Public License as published by
// the Free Software Foundation, either version 3 of the License, or
// (at your option) any later version.
//
// This program is distributed in the hope that it will be useful,
// but WITHOUT ANY WARRANTY; without even the implied warranty of
// MERCHANTABILITY or FITNESS FOR A PARTICULAR PURPOSE.  See the
// GNU Affero General Public License for more details.
//
// You should have received a copy of the GNU Affero General Public License
// along with this program.  If not, see <https://www.gnu.org/licenses/>.

use std::fmt::{Debug, Display};

use rand::prelude::Distribution;
use rand::Rng;

/// Paste identifiers handed out by the service.
#[derive(Clone, Copy, PartialEq, Eq)]
pub struct ShortCode<const N: usize>([ShortCodeChar; N]);

impl<const N: usize> Display for ShortCode<N> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        self.0.iter().try_for_each(|c| write!(f, "{}", c.0))
    }
}

impl<const N: usize> Debug for ShortCode<N> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_tuple("ShortCode").field(&self.to_string()).finish()
    }
}

/// `ShortCodeChar` uses the Word-safe alphabet, a Base32 extension of the Open
/// Location Code Base20 alphabet.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
struct ShortCodeChar(char);

pub struct Generator;

const ALPHABET: &[u8; 32] = b"23456789CFGHJMPQRVWXcfghjmpqrvwx";

impl Distribution<ShortCodeChar> for Generator {
    fn sample<R: Rng + ?Sized>(&self, rng: &mut R) -> ShortCodeChar {
        ShortCodeChar(ALPHABET[rng.gen_range(0..ALPHABET.len())] as char)
    }
}

impl<const N: usize> Distribution<ShortCode<N>> for Generator {
    fn sample<R: Rng + ?Sized>(&self, rng: &mut R) -> ShortCode<N> {
        let mut arr = [ShortCodeChar('\0'); N];

        for c in &mut arr {
            *c = self.sample(rng);
        }

        ShortCode(arr)
    }
}
