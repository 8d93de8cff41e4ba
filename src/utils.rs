//! Utility routines for loading and storing data into files.
use csv::{ReaderBuilder, Writer};
use ndarray::prelude::*;
use std::fmt::Display;
use std::str::FromStr;

use crate::error::{Error, LearningResult};


fn parse<T: FromStr>(field: &str, line: usize) -> LearningResult<T> {
    field.trim()
         .parse::<T>()
         .map_err(|_| Error::InputValidation(
             format!("line {}: cannot parse '{}'", line, field)))
}

/// Reads a headerless CSV file into rows of fields, checking that all the
/// rows have the same number of fields.
fn read_rows(fname: &str) -> LearningResult<Vec<csv::StringRecord>> {
    let mut reader = ReaderBuilder::new().has_headers(false)
                                         .from_path(fname)?;
    let records = reader.records().collect::<Result<Vec<_>, _>>()?;

    match records.first() {
        None => Err(Error::InputValidation(format!("{} is empty", fname))),
        Some(first) if records.iter().any(|r| r.len() != first.len()) => {
            Err(Error::InputValidation(format!("{}: rows have different lengths", fname)))
        },
        Some(_) => Ok(records),
    }
}

/// Loads a CSV data file.
///
/// The file format should be, for each row:
///     label, x1, x2, ...
/// where x1, x2, ... are features forming a feature vector.
pub fn load_data(fname: &str) -> LearningResult<(Array2<f64>, Array1<usize>)> {
    let records = read_rows(fname)?;
    let d = records[0].len() - 1;
    if d == 0 {
        return Err(Error::InputValidation(format!("{}: rows have no features", fname)));
    }

    let mut inputs = Array2::zeros((records.len(), d));
    let mut targets = Array1::zeros(records.len());

    for (i, record) in records.iter().enumerate() {
        targets[i] = parse(&record[0], i + 1)?;
        for (j, field) in record.iter().skip(1).enumerate() {
            inputs[[i, j]] = parse(field, i + 1)?;
        }
    }

    Ok((inputs, targets))
}

/// Loads predicted probabilities from a CSV file.
///
/// Each line contains the probabilities of one example:
///     p0, p1, ...
/// where each value corresponds to a label.
pub fn load_probabilities(fname: &str) -> LearningResult<Array2<f64>> {
    let records = read_rows(fname)?;

    let mut probabilities = Array2::zeros((records.len(), records[0].len()));
    for (i, record) in records.iter().enumerate() {
        for (j, field) in record.iter().enumerate() {
            probabilities[[i, j]] = parse(field, i + 1)?;
        }
    }

    Ok(probabilities)
}

/// Stores a matrix (e.g., predicted probabilities) into a CSV file, one
/// row per line.
pub fn store_predictions<T>(predictions: ArrayView2<T>, fname: &str)
        -> LearningResult<()> where T: Display {
    let mut writer = Writer::from_path(fname)?;

    for x in predictions.outer_iter() {
        writer.write_record(x.iter()
                             .map(|v| format!("{}", v)))?;
    }

    writer.flush()?;
    Ok(())
}

/// Stores a vector (e.g., a noise mask) into a CSV file, one value
/// per line.
pub fn store_vector<T>(values: ArrayView1<T>, fname: &str)
        -> LearningResult<()> where T: Display {
    let mut writer = Writer::from_path(fname)?;

    for v in values.iter() {
        writer.write_record(&[format!("{}", v)])?;
    }

    writer.flush()?;
    Ok(())
}
