use crate::commands::{run_with_database, CommandResult};
use renoquote_db::CatalogSeed;

pub fn run() -> CommandResult {
    run_with_database("seed", |_config, pool| async move {
        let seeded = CatalogSeed::load(&pool)
            .await
            .map_err(|error| ("seed_execution", error.to_string(), 5u8))?;

        let verification = CatalogSeed::verify(&pool)
            .await
            .map_err(|error| ("seed_verification", error.to_string(), 6u8))?;
        if !verification.all_present {
            let failed_checks = verification
                .checks
                .iter()
                .filter_map(|(check, passed)| (!passed).then_some(*check))
                .collect::<Vec<_>>();
            return Err(("seed_verification", verification_message(&failed_checks), 6u8));
        }

        let message = format!(
            "catalog seed loaded: {} labor rates, {} material prices, {} composite costs",
            seeded.labor, seeded.materials, seeded.composites
        );
        Ok(CommandResult::success_with("seed", message, seeded))
    })
}

fn verification_message(failed_checks: &[&str]) -> String {
    if failed_checks.is_empty() {
        "some catalog rows failed to load".to_string()
    } else {
        format!("catalog verification failed for: {}", failed_checks.join(", "))
    }
}

#[cfg(test)]
mod tests {
    use super::verification_message;

    #[test]
    fn verification_error_message_targets_failed_checks() {
        let checks = [("labor_cost", true), ("material_price", false), ("composite_cost", false)];

        let failed_checks = checks
            .iter()
            .filter_map(|(check, passed)| (!passed).then_some(*check))
            .collect::<Vec<_>>();

        assert_eq!(
            verification_message(&failed_checks),
            "catalog verification failed for: material_price, composite_cost"
        );
    }

    #[test]
    fn verification_error_message_falls_back_to_generic_when_no_labels() {
        assert_eq!(verification_message(&[]), "some catalog rows failed to load");
    }
}
