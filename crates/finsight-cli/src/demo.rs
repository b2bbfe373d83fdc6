//! Demo transaction generation
//!
//! Draws from a fixed pool of realistic description/amount/category samples,
//! with amount and time-of-day jitter, spread over the requested number of
//! days. Used by `finsight seed`.

use chrono::{Duration, Timelike, Utc};
use rand::rngs::StdRng;
use rand::Rng;

use finsight_core::models::{Category, NewTransaction};

struct Sample {
    amount: f64,
    description: &'static str,
    category: Category,
    is_income: bool,
}

const fn expense(amount: f64, description: &'static str, category: Category) -> Sample {
    Sample {
        amount,
        description,
        category,
        is_income: false,
    }
}

const SAMPLES: &[Sample] = &[
    // Food & Dining
    expense(45.67, "Whole Foods Market", Category::FoodDining),
    expense(12.50, "Starbucks Coffee", Category::FoodDining),
    expense(89.23, "Restaurant Dinner", Category::FoodDining),
    expense(156.78, "Grocery Shopping Safeway", Category::FoodDining),
    expense(23.45, "McDonald's Drive Thru", Category::FoodDining),
    // Transportation
    expense(67.89, "Shell Gas Station", Category::Transportation),
    expense(15.00, "Uber Ride Downtown", Category::Transportation),
    expense(8.50, "Metro Transit Pass", Category::Transportation),
    expense(25.00, "Airport Parking Fee", Category::Transportation),
    // Shopping
    expense(234.56, "Amazon Online Purchase", Category::Shopping),
    expense(78.90, "Target Store", Category::Shopping),
    expense(145.67, "Clothing Store H&M", Category::Shopping),
    expense(56.78, "Best Buy Electronics", Category::Shopping),
    // Bills & Utilities
    expense(1250.00, "Monthly Rent Payment", Category::BillsUtilities),
    expense(89.45, "Electric Bill PG&E", Category::BillsUtilities),
    expense(65.00, "Internet Service Comcast", Category::BillsUtilities),
    expense(45.99, "Phone Bill Verizon", Category::BillsUtilities),
    expense(34.56, "Water Utility Bill", Category::BillsUtilities),
    // Entertainment
    expense(15.99, "Netflix Subscription", Category::Entertainment),
    expense(9.99, "Spotify Premium", Category::Entertainment),
    expense(45.00, "Movie Theater Tickets", Category::Entertainment),
    expense(67.89, "Concert Ticket", Category::Entertainment),
    // Healthcare
    expense(25.00, "Pharmacy CVS Prescription", Category::Healthcare),
    expense(150.00, "Doctor Visit Copay", Category::Healthcare),
    expense(89.99, "Dental Cleaning", Category::Healthcare),
    // Income
    Sample {
        amount: 4500.00,
        description: "Salary Deposit",
        category: Category::Income,
        is_income: true,
    },
    Sample {
        amount: 750.00,
        description: "Freelance Payment",
        category: Category::Income,
        is_income: true,
    },
    Sample {
        amount: 125.00,
        description: "Investment Dividend",
        category: Category::Income,
        is_income: true,
    },
    Sample {
        amount: 50.00,
        description: "Cashback Reward",
        category: Category::Income,
        is_income: true,
    },
];

/// Generate 1-5 sampled transactions per day for the trailing `days_back` days
pub fn generate(user_id: &str, days_back: u32, rng: &mut StdRng) -> Vec<NewTransaction> {
    let base = Utc::now();
    let mut transactions = Vec::new();

    for day in 0..days_back {
        let per_day = rng.gen_range(1..=5);
        let midnight = (base - Duration::days(day as i64))
            .with_hour(0)
            .and_then(|d| d.with_minute(0))
            .and_then(|d| d.with_second(0))
            .and_then(|d| d.with_nanosecond(0))
            .unwrap_or(base);

        for _ in 0..per_day {
            let sample = &SAMPLES[rng.gen_range(0..SAMPLES.len())];
            let variation = rng.gen_range(0.8..1.2);
            let date = midnight
                + Duration::hours(rng.gen_range(6..=22))
                + Duration::minutes(rng.gen_range(0..60));

            transactions.push(NewTransaction {
                user_id: user_id.to_string(),
                amount: (sample.amount * variation * 100.0).round() / 100.0,
                description: sample.description.to_string(),
                category: Some(sample.category),
                predicted_category: None,
                confidence_score: None,
                date,
                is_income: sample.is_income,
            });
        }
    }

    transactions
}
