//! Segment management
//!
//! Segments store trip batches in columnar Parquet format

use arrow::array::{
    Array, ArrayRef, Float64Array, Float64Builder, RecordBatch, StringArray, StringBuilder,
    TimestampMicrosecondArray, TimestampMicrosecondBuilder,
};
use arrow::datatypes::{DataType, Field, Schema as ArrowSchema, TimeUnit};
use bytes::Bytes;
use chrono::DateTime;
use parquet::arrow::{arrow_reader::ParquetRecordBatchReaderBuilder, ArrowWriter};
use parquet::file::properties::WriterProperties;
use std::sync::Arc;

use crate::types::{GeoPoint, Trip};
use crate::{Error, Result};

const COL_REGION: &str = "region";
const COL_ORIGIN_LON: &str = "origin_lon";
const COL_ORIGIN_LAT: &str = "origin_lat";
const COL_DESTINATION_LON: &str = "destination_lon";
const COL_DESTINATION_LAT: &str = "destination_lat";
const COL_DATETIME: &str = "datetime";
const COL_DATASOURCE: &str = "datasource";

/// Arrow schema shared by every trip segment
pub fn trip_schema() -> Arc<ArrowSchema> {
    Arc::new(ArrowSchema::new(vec![
        Field::new(COL_REGION, DataType::Utf8, false),
        Field::new(COL_ORIGIN_LON, DataType::Float64, false),
        Field::new(COL_ORIGIN_LAT, DataType::Float64, false),
        Field::new(COL_DESTINATION_LON, DataType::Float64, false),
        Field::new(COL_DESTINATION_LAT, DataType::Float64, false),
        Field::new(
            COL_DATETIME,
            DataType::Timestamp(TimeUnit::Microsecond, None),
            false,
        ),
        Field::new(COL_DATASOURCE, DataType::Utf8, false),
    ]))
}

/// Segment writer for creating Parquet files
pub struct SegmentWriter {
    pub arrow_schema: Arc<ArrowSchema>,
}

impl Default for SegmentWriter {
    fn default() -> Self {
        Self::new()
    }
}

impl SegmentWriter {
    pub fn new() -> Self {
        Self {
            arrow_schema: trip_schema(),
        }
    }

    /// Write trips to Parquet format
    pub fn write_parquet(&self, trips: &[Trip]) -> Result<Bytes> {
        let batch = self.trips_to_record_batch(trips)?;

        let mut buffer = Vec::new();
        let props = WriterProperties::builder()
            .set_compression(parquet::basic::Compression::SNAPPY)
            .build();

        let mut writer = ArrowWriter::try_new(&mut buffer, self.arrow_schema.clone(), Some(props))?;

        writer.write(&batch)?;
        writer.close()?;

        Ok(Bytes::from(buffer))
    }

    /// Convert trips to Arrow RecordBatch
    fn trips_to_record_batch(&self, trips: &[Trip]) -> Result<RecordBatch> {
        let num_rows = trips.len();

        let mut region = StringBuilder::with_capacity(num_rows, num_rows * 8);
        let mut origin_lon = Float64Builder::with_capacity(num_rows);
        let mut origin_lat = Float64Builder::with_capacity(num_rows);
        let mut destination_lon = Float64Builder::with_capacity(num_rows);
        let mut destination_lat = Float64Builder::with_capacity(num_rows);
        let mut datetime = TimestampMicrosecondBuilder::with_capacity(num_rows);
        let mut datasource = StringBuilder::with_capacity(num_rows, num_rows * 8);

        for trip in trips {
            region.append_value(&trip.region);
            origin_lon.append_value(trip.origin.lon);
            origin_lat.append_value(trip.origin.lat);
            destination_lon.append_value(trip.destination.lon);
            destination_lat.append_value(trip.destination.lat);
            datetime.append_value(trip.datetime.and_utc().timestamp_micros());
            datasource.append_value(&trip.datasource);
        }

        let columns: Vec<ArrayRef> = vec![
            Arc::new(region.finish()),
            Arc::new(origin_lon.finish()),
            Arc::new(origin_lat.finish()),
            Arc::new(destination_lon.finish()),
            Arc::new(destination_lat.finish()),
            Arc::new(datetime.finish()),
            Arc::new(datasource.finish()),
        ];

        Ok(RecordBatch::try_new(self.arrow_schema.clone(), columns)?)
    }
}

/// Segment reader for decoding Parquet files
#[derive(Default)]
pub struct SegmentReader;

impl SegmentReader {
    pub fn new() -> Self {
        Self
    }

    /// Read trips from Parquet bytes
    pub fn read_parquet(&self, data: Bytes) -> Result<Vec<Trip>> {
        let reader = ParquetRecordBatchReaderBuilder::try_new(data)?.build()?;

        let mut trips = Vec::new();

        for batch_result in reader {
            let batch = batch_result?;
            trips.extend(self.record_batch_to_trips(&batch)?);
        }

        Ok(trips)
    }

    /// Convert Arrow RecordBatch to trips
    fn record_batch_to_trips(&self, batch: &RecordBatch) -> Result<Vec<Trip>> {
        let region = string_column(batch, COL_REGION)?;
        let origin_lon = float_column(batch, COL_ORIGIN_LON)?;
        let origin_lat = float_column(batch, COL_ORIGIN_LAT)?;
        let destination_lon = float_column(batch, COL_DESTINATION_LON)?;
        let destination_lat = float_column(batch, COL_DESTINATION_LAT)?;
        let datasource = string_column(batch, COL_DATASOURCE)?;
        let datetime = column(batch, COL_DATETIME)?
            .as_any()
            .downcast_ref::<TimestampMicrosecondArray>()
            .ok_or_else(|| Error::internal("datetime column is not TimestampMicrosecondArray"))?;

        (0..batch.num_rows())
            .map(|row| {
                let micros = datetime.value(row);
                let datetime = DateTime::from_timestamp_micros(micros)
                    .ok_or_else(|| Error::internal(format!("Timestamp out of range: {}", micros)))?
                    .naive_utc();

                Ok(Trip {
                    region: region.value(row).to_string(),
                    origin: GeoPoint::new(origin_lon.value(row), origin_lat.value(row)),
                    destination: GeoPoint::new(
                        destination_lon.value(row),
                        destination_lat.value(row),
                    ),
                    datetime,
                    datasource: datasource.value(row).to_string(),
                })
            })
            .collect()
    }
}

fn column<'a>(batch: &'a RecordBatch, name: &str) -> Result<&'a ArrayRef> {
    batch
        .column_by_name(name)
        .ok_or_else(|| Error::internal(format!("Segment is missing column '{}'", name)))
}

fn string_column<'a>(batch: &'a RecordBatch, name: &str) -> Result<&'a StringArray> {
    column(batch, name)?
        .as_any()
        .downcast_ref::<StringArray>()
        .ok_or_else(|| Error::internal(format!("{} column is not StringArray", name)))
}

fn float_column<'a>(batch: &'a RecordBatch, name: &str) -> Result<&'a Float64Array> {
    column(batch, name)?
        .as_any()
        .downcast_ref::<Float64Array>()
        .ok_or_else(|| Error::internal(format!("{} column is not Float64Array", name)))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ingest::parser::parse_datetime;

    #[test]
    fn test_parquet_roundtrip() {
        let trips = vec![
            Trip {
                region: "Prague".to_string(),
                origin: GeoPoint::new(14.4973794438195, 50.00136875782316),
                destination: GeoPoint::new(14.43109483523328, 50.04052930943246),
                datetime: parse_datetime("2018-05-28 09:03:40.250").unwrap(),
                datasource: "funny_car".to_string(),
            },
            Trip {
                region: "Turin".to_string(),
                origin: GeoPoint::new(7.672837913286881, 44.9957109242058),
                destination: GeoPoint::new(7.720368637535126, 45.06782385393849),
                datetime: parse_datetime("2018-05-21 02:54:04").unwrap(),
                datasource: "baba_car".to_string(),
            },
        ];

        let parquet_data = SegmentWriter::new().write_parquet(&trips).unwrap();
        let read_back = SegmentReader::new().read_parquet(parquet_data).unwrap();

        assert_eq!(read_back, trips);
    }

    #[test]
    fn test_rejects_garbage() {
        let result = SegmentReader::new().read_parquet(Bytes::from_static(b"not parquet"));
        assert!(matches!(result, Err(Error::Parquet(_))));
    }

    #[test]
    fn test_mismatched_columns_are_arrow_errors() {
        let region: ArrayRef = Arc::new(StringArray::from(vec!["Prague"]));
        let result: Result<RecordBatch> =
            RecordBatch::try_new(trip_schema(), vec![region]).map_err(Error::from);
        assert!(matches!(result, Err(Error::Arrow(_))));
    }
}
