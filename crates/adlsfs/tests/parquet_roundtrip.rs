use adlsfs::{FileSystem, HandlerOptions};
use anyhow::Result;
use arrow_array::{Array, ArrayRef, Int64Array, RecordBatch, StringArray};
use arrow_schema::{DataType, Field, Schema};
use parquet::arrow::ArrowWriter;
use parquet::arrow::arrow_reader::ParquetRecordBatchReaderBuilder;
use std::sync::Arc;

mod common;

fn sample_batch() -> Result<RecordBatch> {
    let schema = Arc::new(Schema::new(vec![
        Field::new("timestamp", DataType::Int64, false),
        Field::new("site", DataType::Utf8, true),
    ]));
    let timestamps: ArrayRef = Arc::new(Int64Array::from_iter_values(0..1000));
    let sites: ArrayRef = Arc::new(StringArray::from_iter(
        (0..1000).map(|i| (i % 7 != 0).then(|| format!("site-{}", i % 13))),
    ));
    Ok(RecordBatch::try_new(schema, vec![timestamps, sites])?)
}

#[test]
fn test_parquet_file_written_and_read_through_streams() -> Result<()> {
    // Small blocks so the file spans many appends
    let f = common::fixture_with(
        HandlerOptions {
            block_size: 1024,
            read_ahead: 512,
            page_size: None,
        },
        None,
    );
    f.bound.create_dir("tables", false)?;
    let batch = sample_batch()?;

    let mut out = f.bound.open_output_stream(
        "tables/part-0.parquet",
        &[("Content-Type", "application/vnd.apache.parquet")],
    )?;
    let mut writer = ArrowWriter::try_new(&mut out, batch.schema(), None)?;
    writer.write(&batch)?;
    _ = writer.close()?;
    out.close()?;

    let info = f.bound.get_file_info("tables/part-0.parquet")?;
    assert!(info.is_file());
    assert!(info.size.is_some_and(|s| s > 1024));

    let mut input = f.bound.open_input_file("tables/part-0.parquet")?;
    let data = input.read_all()?;
    assert_eq!(Some(data.len() as u64), info.size);

    let reader = ParquetRecordBatchReaderBuilder::try_new(data)?.build()?;
    let batches = reader.collect::<std::result::Result<Vec<_>, _>>()?;
    let rows: usize = batches.iter().map(RecordBatch::num_rows).sum();
    assert_eq!(rows, 1000);
    assert_eq!(batches[0].schema(), batch.schema());

    let total: i64 = batches
        .iter()
        .filter_map(|b| b.column(0).as_any().downcast_ref::<Int64Array>())
        .flat_map(|a| a.values().iter().copied())
        .sum();
    assert_eq!(total, (0..1000).sum::<i64>());
    Ok(())
}
