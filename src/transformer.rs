//! Record rewriting: the only stage that knows the field layout.
//!
//! [`RecordTransformer`] walks the raw buffer one record at a time. Record
//! spans come from the newline boundaries, with synthetic boundaries at
//! offset `0` and at `N`; the separators inside each span come from the
//! delimiter boundaries. The selected fields are written as
//! `ID,LATITUDE,LONGITUDE\n` at the output cursor and the sentinel follows
//! the last record.
//!
//! Boundaries reach the transformer through the [`BoundarySource`] trait, so
//! the same record loop consumes fully materialized [`BoundarySet`]s (see
//! [`CompletedBoundaries`]) or boundaries that are still being streamed by
//! the scanner lanes (see [`crate::streaming`]).
//!
//! # Examples
//!
//! ```
//! use gotrack::arena::SharedArena;
//! use gotrack::boundary_scanner::BoundaryScanner;
//! use gotrack::schema::TrackSchema;
//! use gotrack::transformer::RecordTransformer;
//!
//! let mut arena = SharedArena::from_input(b"1,0,-19.0,-42.0\n2,0,-19.1,-42.1\n".to_vec(), "demo")?;
//! let (raw, out) = arena.split();
//! let newlines = BoundaryScanner::newline().scan(raw.as_bytes());
//! let delimiters = BoundaryScanner::delimiter().scan(raw.as_bytes());
//!
//! let transformer = RecordTransformer::new(TrackSchema::new(4, 0, 2, 3)?);
//! let summary = transformer.transform(raw, &newlines, &delimiters, out)?;
//! assert_eq!(summary.emitted, 2);
//!
//! assert_eq!(arena.output()?.content(), b"1,-19.0,-42.0\n2,-19.1,-42.1\n");
//! # Ok::<(), gotrack::TransformError>(())
//! ```

use std::ops::Range;

use smallvec::SmallVec;

use crate::arena::{OutputView, RawView};
use crate::boundary_scanner::{BoundarySet, FIELD_SEPARATOR, RECORD_TERMINATOR};
use crate::error::Result;
use crate::recovery::{RecoveryContext, RecoveryMode, Verdict};
use crate::schema::{HeaderPolicy, TrackSchema, OUTPUT_HEADER};

/// Supplier of record and field boundaries, in increasing offset order.
pub trait BoundarySource {
    /// Next record terminator, or `None` once every terminator was delivered.
    ///
    /// # Errors
    ///
    /// Returns an error if the producer of the boundaries failed.
    fn next_terminator(&mut self) -> Result<Option<usize>>;

    /// Every not-yet-delivered separator with an offset below `end`.
    ///
    /// # Errors
    ///
    /// Returns an error if the producer of the boundaries failed.
    fn separators_before(&mut self, end: usize) -> Result<&[usize]>;

    /// Consume whatever is left once the last record has been handled.
    ///
    /// # Errors
    ///
    /// Returns an error if the producer of the boundaries failed.
    fn finish(&mut self) -> Result<()> {
        Ok(())
    }
}

/// [`BoundarySource`] over two fully materialized boundary sets.
#[derive(Debug)]
pub struct CompletedBoundaries<'a> {
    terminators: &'a [usize],
    separators: &'a [usize],
    next_terminator: usize,
    next_separator: usize,
}

impl<'a> CompletedBoundaries<'a> {
    /// Pair the newline and delimiter sets.
    #[must_use]
    pub fn new(newlines: &'a BoundarySet, delimiters: &'a BoundarySet) -> Self {
        Self {
            terminators: newlines.offsets(),
            separators: delimiters.offsets(),
            next_terminator: 0,
            next_separator: 0,
        }
    }
}

impl BoundarySource for CompletedBoundaries<'_> {
    fn next_terminator(&mut self) -> Result<Option<usize>> {
        let next = self.terminators.get(self.next_terminator).copied();
        if next.is_some() {
            self.next_terminator += 1;
        }
        Ok(next)
    }

    fn separators_before(&mut self, end: usize) -> Result<&[usize]> {
        let lo = self.next_separator;
        let remaining = &self.separators[lo..];
        self.next_separator += remaining.partition_point(|&o| o < end);
        Ok(&self.separators[lo..self.next_separator])
    }
}

/// Counters for one transformer run.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct TransformSummary {
    /// Non-empty records seen, header included.
    pub records: usize,
    /// Records written to the output.
    pub emitted: usize,
    /// Records dropped by the recovery policy.
    pub skipped: usize,
    /// Zero-length records (blank lines, trailing terminator).
    pub blank: usize,
    /// Whether a header record was consumed.
    pub header: bool,
    /// Offset of the sentinel, which is the logical output length.
    pub output_len: usize,
}

/// Rewrites source records into the normalized three-field layout.
#[derive(Debug, Clone, Copy, Default)]
pub struct RecordTransformer {
    schema: TrackSchema,
    header: HeaderPolicy,
    recovery: RecoveryMode,
}

impl RecordTransformer {
    /// Transformer for `schema` with no header and strict recovery.
    #[must_use]
    pub fn new(schema: TrackSchema) -> Self {
        Self {
            schema,
            header: HeaderPolicy::Absent,
            recovery: RecoveryMode::Strict,
        }
    }

    /// Set the header policy.
    #[must_use]
    pub fn with_header(mut self, header: HeaderPolicy) -> Self {
        self.header = header;
        self
    }

    /// Set the recovery mode.
    #[must_use]
    pub fn with_recovery(mut self, recovery: RecoveryMode) -> Self {
        self.recovery = recovery;
        self
    }

    /// Transform using completed boundary sets.
    ///
    /// # Errors
    ///
    /// See [`RecordTransformer::run`].
    pub fn transform(
        &self,
        raw: RawView<'_>,
        newlines: &BoundarySet,
        delimiters: &BoundarySet,
        out: OutputView<'_>,
    ) -> Result<TransformSummary> {
        let mut source = CompletedBoundaries::new(newlines, delimiters);
        self.run(raw, &mut source, out)
    }

    /// Rewrite every record and seal the output.
    ///
    /// # Errors
    ///
    /// - [`TransformError::MalformedRecord`](crate::TransformError::MalformedRecord)
    ///   for a field-count mismatch under strict recovery.
    /// - [`TransformError::OutputOverflow`](crate::TransformError::OutputOverflow)
    ///   if the output would not fit the region.
    /// - Any error reported by `source`.
    pub fn run<S: BoundarySource>(
        &self,
        raw: RawView<'_>,
        source: &mut S,
        mut out: OutputView<'_>,
    ) -> Result<TransformSummary> {
        let bytes = raw.as_bytes();
        let len = bytes.len();
        let mut recovery = RecoveryContext::new(self.recovery);
        let mut summary = TransformSummary::default();
        let mut start = 0;
        let mut record = 0;

        loop {
            let terminator = source.next_terminator()?;
            if terminator.is_none() && start >= len {
                // Input ended on a terminator: no trailing record.
                break;
            }
            let end = terminator.unwrap_or(len);
            let separators = source.separators_before(end)?;
            self.project(
                bytes,
                record,
                start..end,
                separators,
                &mut recovery,
                &mut out,
                &mut summary,
            )?;
            record += 1;
            match terminator {
                Some(t) => start = t + 1,
                None => break,
            }
        }

        source.finish()?;
        summary.skipped = recovery.skipped;
        summary.output_len = out.seal()?;
        Ok(summary)
    }

    #[allow(clippy::too_many_arguments)]
    fn project(
        &self,
        bytes: &[u8],
        record: usize,
        span: Range<usize>,
        separators: &[usize],
        recovery: &mut RecoveryContext,
        out: &mut OutputView<'_>,
        summary: &mut TransformSummary,
    ) -> Result<()> {
        if span.is_empty() {
            summary.blank += 1;
            return Ok(());
        }
        debug_assert!(bytes[span.end..].first().map_or(true, |&b| b == RECORD_TERMINATOR));

        let first = summary.records == 0;
        summary.records += 1;
        if first && self.header != HeaderPolicy::Absent {
            summary.header = true;
            if self.header == HeaderPolicy::Rewrite {
                out.put(OUTPUT_HEADER)?;
            }
            return Ok(());
        }

        let mut fields: SmallVec<[(usize, usize); 8]> = SmallVec::new();
        let mut field_start = span.start;
        for &sep in separators {
            debug_assert!(span.contains(&sep) && bytes[sep] == FIELD_SEPARATOR);
            fields.push((field_start, sep));
            field_start = sep + 1;
        }
        fields.push((field_start, span.end));

        if recovery.check(&self.schema, record, span.start, fields.len())? == Verdict::Skip {
            return Ok(());
        }

        let [id, lat, lon] = self.schema.projection();
        let field = |i: usize| &bytes[fields[i].0..fields[i].1];
        out.put(field(id))?;
        out.put(&[FIELD_SEPARATOR])?;
        out.put(field(lat))?;
        out.put(&[FIELD_SEPARATOR])?;
        out.put(field(lon))?;
        out.put(&[RECORD_TERMINATOR])?;
        summary.emitted += 1;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::arena::{SharedArena, SENTINEL};
    use crate::boundary_scanner::BoundaryScanner;
    use crate::error::TransformError;

    fn four_column() -> TrackSchema {
        TrackSchema::new(4, 0, 2, 3).unwrap()
    }

    fn run(
        input: &[u8],
        transformer: RecordTransformer,
    ) -> (Result<TransformSummary>, SharedArena) {
        let mut arena = SharedArena::from_input(input.to_vec(), "test").unwrap();
        let result = {
            let (raw, out) = arena.split();
            let newlines = BoundaryScanner::newline().scan(raw.as_bytes());
            let delimiters = BoundaryScanner::delimiter().scan(raw.as_bytes());
            transformer.transform(raw, &newlines, &delimiters, out)
        };
        (result, arena)
    }

    #[test]
    fn test_transform_reference_example() {
        let (summary, arena) = run(
            b"1,0,-19.0,-42.0\n2,0,-19.1,-42.1\n",
            RecordTransformer::new(four_column()),
        );
        let summary = summary.unwrap();
        assert_eq!(summary.records, 2);
        assert_eq!(summary.emitted, 2);
        assert_eq!(summary.blank, 0);
        assert_eq!(
            arena.output().unwrap().content(),
            b"1,-19.0,-42.0\n2,-19.1,-42.1\n"
        );
    }

    #[test]
    fn test_transform_go_track_layout() {
        let input = b"1,-10.939341,-37.062742,1,2014-09-13 07:24:32\n\
                      2,-10.939341,-37.062742,1,2014-09-13 07:24:37\n";
        let (summary, arena) = run(input, RecordTransformer::default());
        assert_eq!(summary.unwrap().emitted, 2);
        assert_eq!(
            arena.output().unwrap().content(),
            b"1,-10.939341,-37.062742\n1,-10.939341,-37.062742\n".as_slice()
        );
    }

    #[test]
    fn test_unterminated_last_record_gets_newline() {
        let (summary, arena) = run(b"7,x,1.5,2.5", RecordTransformer::new(four_column()));
        let summary = summary.unwrap();
        assert_eq!(summary.emitted, 1);
        let output = arena.output().unwrap();
        assert_eq!(output.content(), b"7,1.5,2.5\n");
        assert_eq!(output.as_capacity()[output.len()], SENTINEL);
    }

    #[test]
    fn test_trailing_terminator_adds_no_record() {
        let (summary, _arena) = run(b"7,x,1.5,2.5\n", RecordTransformer::new(four_column()));
        let summary = summary.unwrap();
        assert_eq!(summary.records, 1);
        assert_eq!(summary.blank, 0);
    }

    #[test]
    fn test_blank_lines_are_not_records() {
        let (summary, arena) = run(
            b"\n1,a,2,3\n\n4,b,5,6\n\n",
            RecordTransformer::new(four_column()),
        );
        let summary = summary.unwrap();
        assert_eq!(summary.records, 2);
        assert_eq!(summary.blank, 3);
        assert_eq!(arena.output().unwrap().content(), b"1,2,3\n4,5,6\n");
    }

    #[test]
    fn test_strict_rejects_short_record() {
        let (result, arena) = run(b"1,a,2,3\n4,b\n", RecordTransformer::new(four_column()));
        match result {
            Err(TransformError::MalformedRecord {
                record,
                offset,
                expected,
                found,
            }) => {
                assert_eq!((record, offset, expected, found), (1, 8, 4, 2));
            },
            other => panic!("expected MalformedRecord, got {other:?}"),
        }
        assert!(arena.output().is_err());
    }

    #[test]
    fn test_lenient_skips_short_record() {
        let transformer =
            RecordTransformer::new(four_column()).with_recovery(RecoveryMode::Lenient);
        let (summary, arena) = run(b"1,a,2,3\n4,b\n5,c,6,7\n", transformer);
        let summary = summary.unwrap();
        assert_eq!(summary.emitted, 2);
        assert_eq!(summary.skipped, 1);
        assert_eq!(arena.output().unwrap().content(), b"1,2,3\n5,6,7\n");
    }

    #[test]
    fn test_permissive_projects_long_record() {
        let transformer =
            RecordTransformer::new(four_column()).with_recovery(RecoveryMode::Permissive);
        let (summary, arena) = run(b"1,a,2,3,extra\n", transformer);
        assert_eq!(summary.unwrap().emitted, 1);
        assert_eq!(arena.output().unwrap().content(), b"1,2,3\n");
    }

    #[test]
    fn test_header_skip() {
        let transformer = RecordTransformer::new(four_column()).with_header(HeaderPolicy::Skip);
        let (summary, arena) = run(b"id,flag,lat,lon\n1,a,2,3\n", transformer);
        let summary = summary.unwrap();
        assert!(summary.header);
        assert_eq!(summary.emitted, 1);
        assert_eq!(arena.output().unwrap().content(), b"1,2,3\n");
    }

    #[test]
    fn test_header_rewrite() {
        let transformer =
            RecordTransformer::new(TrackSchema::GO_TRACK).with_header(HeaderPolicy::Rewrite);
        let (summary, arena) = run(
            b"id,latitude,longitude,track_id,time\n9,-10.9,-37.0,3,t\n",
            transformer,
        );
        assert_eq!(summary.unwrap().emitted, 1);
        assert_eq!(
            arena.output().unwrap().content(),
            b"ID,LATITUDE,LONGITUDE\n3,-10.9,-37.0\n"
        );
    }

    #[test]
    fn test_header_rewrite_longer_than_input_overflows() {
        let transformer =
            RecordTransformer::new(TrackSchema::GO_TRACK).with_header(HeaderPolicy::Rewrite);
        let (result, arena) = run(b"a,b,c,d,e\n1,2,3,4,5\n", transformer);
        assert!(matches!(
            result,
            Err(TransformError::OutputOverflow {
                needed: 23,
                capacity: 21
            })
        ));
        assert!(arena.output().is_err());
    }

    #[test]
    fn test_header_rewrite_absorbed_by_shrinking_records() {
        let mut input = b"a,b,c,d,e\n".to_vec();
        input.extend(b"1,2,3,4,2014-09-13 07:24:32\n".repeat(2));
        let transformer =
            RecordTransformer::new(TrackSchema::GO_TRACK).with_header(HeaderPolicy::Rewrite);
        let (result, arena) = run(&input, transformer);
        assert_eq!(result.unwrap().emitted, 2);
        assert_eq!(
            arena.output().unwrap().content(),
            b"ID,LATITUDE,LONGITUDE\n4,2,3\n4,2,3\n"
        );
    }

    #[test]
    fn test_overflow_is_reported_not_truncated() {
        // Every column projected and no trailing terminator: the added
        // newline plus sentinel needs N + 2 bytes.
        let schema = TrackSchema::new(3, 0, 1, 2).unwrap();
        let (result, _arena) = run(b"1,2,3", RecordTransformer::new(schema));
        assert!(matches!(result, Err(TransformError::OutputOverflow { .. })));
    }

    #[test]
    fn test_completed_boundaries_hand_out_separators_once() {
        let newlines = BoundarySet::from_sorted(vec![4, 9]);
        let delimiters = BoundarySet::from_sorted(vec![1, 3, 6, 11]);
        let mut source = CompletedBoundaries::new(&newlines, &delimiters);

        assert_eq!(source.next_terminator().unwrap(), Some(4));
        assert_eq!(source.separators_before(4).unwrap(), &[1, 3]);
        assert_eq!(source.next_terminator().unwrap(), Some(9));
        assert_eq!(source.separators_before(9).unwrap(), &[6]);
        assert_eq!(source.next_terminator().unwrap(), None);
        assert_eq!(source.separators_before(14).unwrap(), &[11]);
        assert_eq!(source.separators_before(14).unwrap(), &[] as &[usize]);
    }
}
