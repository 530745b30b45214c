//! End-to-end reader scenarios over Parquet fixtures.
#![cfg(feature = "io-parquet")]

use anyhow::Result;
use rowshuffle::testing::*;
use rowshuffle::*;

type Opts = IterOptions<ParquetReadOptions>;

fn collect_single<D: RowDecoder>(
    reader: &mut SingleFileReader<D>,
    opts: &IterOptions<D::Options>,
) -> Result<Vec<D::Row>> {
    Ok(reader.iter(opts)?.collect::<rowshuffle::Result<Vec<_>>>()?)
}

#[test]
fn thousand_rows_in_chunks_of_128() -> Result<()> {
    let tmp = tempfile::tempdir()?;
    let path = write_indexed_parquet(tmp.path(), 0, 1000, 100)?;
    let decoder = CountingDecoder::new(ParquetDecoder::<IndexedRow>::new());
    let calls = decoder.calls();
    let mut reader = SingleFileReader::new(&path, decoder);

    let rows = reader
        .iter(&Opts::new().with_chunk_size(128))?
        .collect::<rowshuffle::Result<Vec<_>>>()?;
    assert_eq!(rows, indexed_rows(0, 1000));

    let ranges = calls.ranges();
    assert_eq!(ranges, chunk_plan(1000, 128));
    assert_eq!(ranges.len(), 8);
    assert!(ranges[..7].iter().all(|r| r.len() == 128));
    assert_eq!(ranges[7], ChunkRange::new(896, 1000));
    assert_eq!(ranges[7].len(), 104);
    reader.close()?;
    Ok(())
}

#[test]
fn two_files_three_and_five_rows() -> Result<()> {
    let tmp = tempfile::tempdir()?;
    let paths = write_indexed_dataset(tmp.path(), &[3, 5], 2)?;
    let mut reader = MultiFileReader::new(paths, ParquetDecoder::<IndexedRow>::new());

    assert_eq!(reader.row_count()?, 8);
    let rows = reader
        .iter(&Opts::new().shuffled(true))?
        .collect::<rowshuffle::Result<Vec<_>>>()?;
    assert_eq!(rows.len(), 8);
    let per_file = rows_per_file(&rows);
    assert_eq!(per_file[&0], 3);
    assert_eq!(per_file[&1], 5);
    reader.close()?;
    Ok(())
}

#[test]
fn shuffle_permutes_chunks_not_rows() -> Result<()> {
    let tmp = tempfile::tempdir()?;
    let path = write_indexed_parquet(tmp.path(), 0, 97, 20)?;
    let decoder = CountingDecoder::new(ParquetDecoder::<IndexedRow>::new());
    let calls = decoder.calls();
    let mut reader = SingleFileReader::new(&path, decoder);

    let opts = Opts::new().shuffled(true).with_chunk_size(10).with_seed(77);
    let rows = collect_single(&mut reader, &opts)?;
    assert_exactly_once(&rows, &indexed_rows(0, 97));

    // Each decoded range matches a plan entry, and all entries are used once.
    let mut ranges = calls.ranges();
    let order = ranges.clone();
    ranges.sort();
    assert_eq!(ranges, chunk_plan(97, 10));

    // Rows come out chunk by chunk in the decode order.
    let mut pos = 0;
    for range in order {
        for index in range.start..range.end {
            assert_eq!(rows[pos].index, index);
            pos += 1;
        }
    }
    Ok(())
}

#[test]
fn exactly_once_across_layouts() -> Result<()> {
    let tmp = tempfile::tempdir()?;
    let sizes = [0, 1, 13, 64, 5];
    let paths = write_indexed_dataset(tmp.path(), &sizes, 7)?;
    let expected: Vec<_> = sizes
        .iter()
        .zip(0u32..)
        .flat_map(|(&n, file)| indexed_rows(file, n))
        .collect();
    let mut reader = MultiFileReader::new(paths, ParquetDecoder::<IndexedRow>::new());

    for chunk_size in [1, 2, 7, 20, 64, 500] {
        for shuffle in [false, true] {
            for selection in [Selection::Uniform, Selection::Weighted] {
                let opts = Opts::new()
                    .shuffled(shuffle)
                    .with_chunk_size(chunk_size)
                    .with_selection(selection)
                    .with_seed(chunk_size);
                let rows = reader
                    .iter(&opts)?
                    .collect::<rowshuffle::Result<Vec<_>>>()?;
                assert_exactly_once(&rows, &expected);
                if !shuffle {
                    assert_eq!(rows, expected);
                }
            }
        }
    }
    Ok(())
}

#[test]
fn early_termination_reads_only_what_was_pulled() -> Result<()> {
    let tmp = tempfile::tempdir()?;
    let paths = write_indexed_dataset(tmp.path(), &[100, 100], 25)?;
    let decoder = CountingDecoder::new(ParquetDecoder::<IndexedRow>::new());
    let calls = decoder.calls();
    let mut reader = MultiFileReader::new(paths, decoder);

    let opts = Opts::new().shuffled(true).with_chunk_size(10).with_seed(2);
    let first: Vec<_> = reader
        .iter(&opts)?
        .take(5)
        .collect::<rowshuffle::Result<_>>()?;
    assert_eq!(first.len(), 5);
    // Five pulls touch at most one chunk per member.
    assert!(calls.chunk_reads() <= 2);
    reader.close()?;
    Ok(())
}

#[test]
fn reuse_after_close_fails() -> Result<()> {
    let tmp = tempfile::tempdir()?;
    let paths = write_indexed_dataset(tmp.path(), &[4, 4], 4)?;
    let mut reader = MultiFileReader::new(paths, ParquetDecoder::<IndexedRow>::new());

    let mut live = reader.iter(&Opts::new().with_chunk_size(2))?;
    assert!(live.next().is_some_and(|r| r.is_ok()));
    reader.close()?;
    reader.close()?;

    let err = reader.row_count().unwrap_err();
    assert_eq!(err.kind(), ErrorKind::Closed);

    // The live sequence still holds one buffered row, then hits the closed file.
    assert!(live.next().is_some_and(|r| r.is_ok()));
    let err = live.next().and_then(|r| r.err()).expect("closed error");
    assert_eq!(err.kind(), ErrorKind::Closed);
    assert!(live.next().is_none());
    Ok(())
}

#[test]
fn options_loaded_from_json_file() -> Result<()> {
    let tmp = tempfile::tempdir()?;
    let path = write_indexed_parquet(tmp.path(), 0, 50, 10)?;
    let config = tmp.path().join("iter.json");
    std::fs::write(
        &config,
        r#"{
            "shuffle": true,
            "chunk_size": 8,
            "seed": 5,
            "selection": "weighted",
            "decoder": { "batch_size": 3 }
        }"#,
    )?;

    let opts = Opts::from_json_file(&config)?;
    assert_eq!(opts.selection, Selection::Weighted);
    assert_eq!(opts.decoder.batch_size, 3);
    assert_eq!(opts.decoder.columns, None);

    let mut reader = SingleFileReader::new(&path, ParquetDecoder::<IndexedRow>::new());
    let first = collect_single(&mut reader, &opts)?;
    let second = collect_single(&mut reader, &opts)?;
    assert_eq!(first, second);
    assert_exactly_once(&first, &indexed_rows(0, 50));
    Ok(())
}
