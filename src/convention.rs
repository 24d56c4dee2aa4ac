use crate::error::CckError;

/// One simulator naming convention for the summary table: the four columns
/// holding the date and the dissolved/trapped/mobile CO2 amounts.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ColumnConvention {
    pub name: &'static str,
    pub date: &'static str,
    pub dissolved: &'static str,
    pub trapped: &'static str,
    pub mobile: &'static str,
}

impl ColumnConvention {
    pub fn required(&self) -> [&'static str; 4] {
        [self.date, self.dissolved, self.trapped, self.mobile]
    }
}

pub const PFLOTRAN: ColumnConvention = ColumnConvention {
    name: "PFLOTRAN",
    date: "DATE",
    dissolved: "FGMDS",
    trapped: "FGMTR",
    mobile: "FGMGP",
};

pub const ECLIPSE: ColumnConvention = ColumnConvention {
    name: "Eclipse",
    date: "DATE",
    dissolved: "FWCD",
    trapped: "FGCDI",
    mobile: "FGCDM",
};

/// Candidates in resolution priority order.
pub const CONVENTIONS: [ColumnConvention; 2] = [PFLOTRAN, ECLIPSE];

/// Return the first convention whose required columns are all present.
/// Extra unrelated columns are ignored. Resolve once per table and keep the
/// result; the answer never changes for an immutable table.
pub fn resolve_convention(
    available: &[String],
    context: &str,
) -> Result<&'static ColumnConvention, CckError> {
    for convention in &CONVENTIONS {
        if convention
            .required()
            .iter()
            .all(|c| available.iter().any(|a| a == c))
        {
            return Ok(convention);
        }
    }
    Err(CckError::SchemaMismatch {
        context: context.to_string(),
        missing: PFLOTRAN
            .required()
            .iter()
            .map(|c| c.to_string())
            .collect(),
        available: available.to_vec(),
    })
}
