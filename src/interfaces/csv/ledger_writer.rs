use crate::domain::enrollment::Enrollment;
use crate::error::Result;
use rust_decimal::Decimal;
use serde::Serialize;
use std::io::Write;

#[derive(Serialize)]
struct LedgerRow<'a> {
    enrollment: &'a str,
    amount_due: Decimal,
    amount_paid: Decimal,
    balance: Decimal,
    status: String,
}

/// Writes the final ledger state of each enrollment as CSV.
pub struct LedgerWriter<W: Write> {
    writer: csv::Writer<W>,
}

impl<W: Write> LedgerWriter<W> {
    pub fn new(sink: W) -> Self {
        Self {
            writer: csv::Writer::from_writer(sink),
        }
    }

    /// Writes one row per (label, enrollment) pair, in the order given.
    pub fn write_ledger<'a, I>(&mut self, rows: I) -> Result<()>
    where
        I: IntoIterator<Item = (&'a str, &'a Enrollment)>,
    {
        for (label, enrollment) in rows {
            self.writer.serialize(LedgerRow {
                enrollment: label,
                amount_due: enrollment.amount_due.0,
                amount_paid: enrollment.amount_paid.0,
                balance: enrollment.balance().0,
                status: enrollment.status.to_string(),
            })?;
        }
        self.writer.flush()?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::enrollment::Balance;
    use rust_decimal_macros::dec;

    #[test]
    fn test_writer_output_shape() {
        let mut enrollment = Enrollment::new(Balance::new(dec!(500000)));
        enrollment.amount_paid = Balance::new(dec!(200000));

        let mut buf = Vec::new();
        {
            let mut writer = LedgerWriter::new(&mut buf);
            writer.write_ledger([("INS-1", &enrollment)]).unwrap();
        }

        let out = String::from_utf8(buf).unwrap();
        let mut lines = out.lines();
        assert_eq!(
            lines.next().unwrap(),
            "enrollment,amount_due,amount_paid,balance,status"
        );
        assert_eq!(lines.next().unwrap(), "INS-1,500000,200000,300000,created");
    }
}
