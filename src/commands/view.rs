use crate::{
    cli::ViewArgs,
    io::{
        backend,
        vcf_writer::{OutputType, VcfWriter},
    },
    utils::util::Result,
};
use std::path::Path;

/// Streams the input to the output, optionally projected onto a sample subset.
pub fn view(args: ViewArgs) -> Result<()> {
    let backend = backend::select(args.backend)?;
    log::debug!("Reading {} with the {} backend", args.input, backend.name());
    let (header, records) = backend.open(Path::new(&args.input))?;

    let (header, keep) = match &args.samples {
        Some(names) => {
            let (subset, indices) = header.subset_samples(names)?;
            log::debug!("Keeping {} of {} sample(s)", names.len(), header.samples().len());
            (subset, Some(indices))
        }
        None => (header, None),
    };

    let mut writer = match &args.output {
        Some(path) => VcfWriter::from_path(path, header)?,
        None => VcfWriter::to_stdout(
            header,
            OutputType::Vcf {
                is_uncompressed: !args.compress,
            },
        )?,
    };
    if args.header_only {
        return writer.finish();
    }

    for record in records {
        let mut record = record?;
        if let Some(indices) = &keep {
            record.retain_calls(indices);
        }
        writer.write_record(&record)?;
    }
    log::info!("Wrote {} record(s)", writer.records_written());
    writer.finish()
}
