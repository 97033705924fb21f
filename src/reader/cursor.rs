//! Row cursor.
//!
//! A cursor iterates the stripes of a file and, within each stripe, the
//! rows of the selected columns:
//!
//! ```no_run
//! # fn main() -> orcfile::Result<()> {
//! let reader = orcfile::Reader::open("scores.orc")?;
//! let mut cursor = reader.select(&["name", "score"])?;
//! while cursor.stripes() {
//!     while cursor.next() {
//!         println!("{:?}", cursor.row());
//!     }
//! }
//! if let Some(err) = cursor.err() {
//!     eprintln!("read failed: {}", err);
//! }
//! # Ok(())
//! # }
//! ```
//!
//! The first error to occur is retained: subsequent `next` and `stripes`
//! calls return false and [`Cursor::err`] surfaces it.

use std::collections::HashSet;

use log::warn;

use super::tree::{create_tree_reader, TreeReader};
use super::{Reader, SizedReadAt};
use crate::error::Error;
use crate::value::Value;

/// Iterates rows of the selected columns, stripe by stripe.
pub struct Cursor<'a, R: SizedReadAt> {
    reader: &'a Reader<R>,
    selected: Vec<usize>,
    included: HashSet<usize>,
    readers: Vec<Box<dyn TreeReader>>,
    next_stripe: usize,
    rows_left: u64,
    current: Vec<Value>,
    err: Option<Error>,
}

impl<'a, R: SizedReadAt> Cursor<'a, R> {
    pub(crate) fn new(
        reader: &'a Reader<R>,
        selected: Vec<usize>,
        included: HashSet<usize>,
    ) -> Self {
        Self {
            reader,
            selected,
            included,
            readers: Vec::new(),
            next_stripe: 0,
            rows_left: 0,
            current: Vec::new(),
            err: None,
        }
    }

    /// Prepares the next stripe for reading. Returns false when no stripe
    /// remains or an error occurred.
    pub fn stripes(&mut self) -> bool {
        if self.err.is_some() {
            return false;
        }
        if self.next_stripe >= self.reader.num_stripes() {
            return false;
        }
        let stripe = self.next_stripe;
        self.next_stripe += 1;
        match self.prepare_stripe(stripe) {
            Ok(()) => true,
            Err(e) => {
                warn!("failed to prepare stripe {}: {}", stripe, e);
                self.err = Some(e);
                false
            }
        }
    }

    fn prepare_stripe(&mut self, stripe: usize) -> crate::error::Result<()> {
        let info = self.reader.stripe_info(stripe)?;
        let (streams, encodings) = self.reader.load_streams(stripe, &self.included)?;
        let mut readers = Vec::with_capacity(self.selected.len());
        for &id in &self.selected {
            readers.push(create_tree_reader(
                self.reader.flat_types(),
                id,
                &streams,
                &encodings,
            )?);
        }
        self.readers = readers;
        self.rows_left = info.number_of_rows;
        Ok(())
    }

    /// Advances every selected reader one row. Returns false at the end of
    /// the stripe or on error.
    pub fn next(&mut self) -> bool {
        if self.err.is_some() || self.rows_left == 0 || self.readers.is_empty() {
            return false;
        }
        let mut row = Vec::with_capacity(self.readers.len());
        for reader in &mut self.readers {
            match reader.next() {
                Ok(value) => row.push(value),
                Err(e) => {
                    self.err = Some(e);
                    self.current.clear();
                    return false;
                }
            }
        }
        self.rows_left -= 1;
        self.current = row;
        true
    }

    /// The values of the current row, one per selected column.
    pub fn row(&self) -> &[Value] {
        &self.current
    }

    /// The first error to have occurred, if any.
    pub fn err(&self) -> Option<&Error> {
        self.err.as_ref()
    }

    /// Takes the first error to have occurred, if any.
    pub fn take_err(&mut self) -> Option<Error> {
        self.err.take()
    }
}
