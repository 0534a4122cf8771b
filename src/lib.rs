pub mod cli;
pub mod error;

pub mod commands {
    pub mod view;
}

pub mod core {
    pub mod allele;
    pub mod coercion;
    pub mod header;
    pub mod header_line;
    pub mod record;
}

pub mod io {
    pub mod backend;
    pub mod readers;
    #[cfg(test)]
    pub mod test_utils;
    pub mod vcf_reader;
    pub mod vcf_writer;
}

pub mod utils {
    pub mod util;
}

pub mod constants;

pub use constants::*;
pub use crate::core::{
    allele::{classify, AltAllele},
    header::Header,
    record::{Call, Record},
};
pub use error::{VcfError, VcfResult};
pub use io::{vcf_reader::VcfReader, vcf_writer::VcfWriter};
