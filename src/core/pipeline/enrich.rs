//! Derived metadata columns and Arrow conversion

use super::batch::RawBatch;
use super::filter::{icd_group, procedure_group, SIA_DIAGNOSIS, SIA_PROCEDURE, SIH_DIAGNOSIS};
use crate::domain::{Result, System, Target};
use arrow::array::{ArrayRef, BooleanArray, Int32Array, StringArray};
use arrow::datatypes::{DataType, Field, Schema};
use arrow::record_batch::RecordBatch;
use std::sync::Arc;

/// Columns appended to every output row; raw columns with these names are replaced
pub const DERIVED_COLUMNS: [&str; 10] = [
    "pa_grupo",
    "pa_subgru",
    "uf_origem",
    "ano_cmpt",
    "mes_cmpt",
    "sistema",
    "main_icd",
    "icd_group",
    "opm_flag",
    "fisio_flag",
];

fn diagnosis_column(system: System) -> &'static str {
    match system {
        System::SihRd => SIH_DIAGNOSIS,
        System::SiaPa => SIA_DIAGNOSIS,
    }
}

/// Converts a filtered batch into an Arrow record batch with derived columns
///
/// Raw columns become nullable UTF-8 columns in their original order,
/// followed by the derived columns.
pub fn enrich(mut batch: RawBatch, target: &Target) -> Result<RecordBatch> {
    let rows = batch.num_rows();

    let main_icd: Vec<Option<String>> = batch
        .column(diagnosis_column(target.system))
        .map(|c| c.to_vec())
        .unwrap_or_else(|| vec![None; rows]);
    let groups: Vec<(String, String)> = match target.system {
        System::SiaPa => {
            let procedure = batch.column(SIA_PROCEDURE);
            (0..rows)
                .map(|row| procedure_group(procedure.and_then(|p| p[row].as_deref())))
                .collect()
        }
        System::SihRd => Vec::new(),
    };

    for name in DERIVED_COLUMNS {
        batch.drop_column(name);
    }

    let mut fields: Vec<Field> = Vec::with_capacity(batch.num_columns() + DERIVED_COLUMNS.len());
    let mut arrays: Vec<ArrayRef> = Vec::with_capacity(fields.capacity());

    for (name, column) in batch.iter() {
        fields.push(Field::new(name, DataType::Utf8, true));
        arrays.push(Arc::new(StringArray::from_iter(
            column.iter().map(|v| v.as_deref()),
        )));
    }

    let (opm, fisio): (Vec<bool>, Vec<bool>) = match target.system {
        System::SiaPa => {
            fields.push(Field::new("pa_grupo", DataType::Utf8, false));
            arrays.push(Arc::new(StringArray::from_iter_values(
                groups.iter().map(|(g, _)| g.as_str()),
            )));
            fields.push(Field::new("pa_subgru", DataType::Utf8, false));
            arrays.push(Arc::new(StringArray::from_iter_values(
                groups.iter().map(|(_, s)| s.as_str()),
            )));
            groups
                .iter()
                .map(|(g, s)| (g == "07", g == "03" && s == "02"))
                .unzip()
        }
        System::SihRd => (vec![false; rows], vec![false; rows]),
    };

    let region = target.region.as_str();
    fields.push(Field::new("uf_origem", DataType::Utf8, false));
    arrays.push(Arc::new(StringArray::from_iter_values(
        std::iter::repeat(region).take(rows),
    )));
    fields.push(Field::new("ano_cmpt", DataType::Int32, false));
    arrays.push(Arc::new(Int32Array::from(vec![target.year; rows])));
    fields.push(Field::new("mes_cmpt", DataType::Int32, false));
    arrays.push(Arc::new(Int32Array::from(vec![target.month as i32; rows])));
    fields.push(Field::new("sistema", DataType::Utf8, false));
    arrays.push(Arc::new(StringArray::from_iter_values(
        std::iter::repeat(target.system.label()).take(rows),
    )));
    fields.push(Field::new("main_icd", DataType::Utf8, true));
    arrays.push(Arc::new(StringArray::from_iter(
        main_icd.iter().map(|v| v.as_deref()),
    )));
    fields.push(Field::new("icd_group", DataType::Utf8, false));
    arrays.push(Arc::new(StringArray::from_iter_values(
        main_icd.iter().map(|v| icd_group(v.as_deref())),
    )));
    fields.push(Field::new("opm_flag", DataType::Boolean, false));
    arrays.push(Arc::new(BooleanArray::from(opm)));
    fields.push(Field::new("fisio_flag", DataType::Boolean, false));
    arrays.push(Arc::new(BooleanArray::from(fisio)));

    Ok(RecordBatch::try_new(
        Arc::new(Schema::new(fields)),
        arrays,
    )?)
}
