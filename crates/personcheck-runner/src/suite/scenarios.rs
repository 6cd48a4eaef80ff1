//! Built-in persons API scenarios

use personcheck_core::{ERROR_OBJECT, Rule, Selector, TestCases};
use serde_json::Value;

use super::{Recorder, Scenario};
use crate::checker::CheckOptions;
use crate::http::query_value;

const PERSON: &str = "PersonResource";
const PERSONS: &str = "PersonsResource";
const JOBS: &str = "JobsResource";
const IMAGE: &str = "ImageResource";
const PHONES: &str = "PhonesResource";
const ADDRESSES: &str = "AddressesResource";
const EMAILS: &str = "EmailsResource";
const MEAL_PLANS: &str = "MealPlansResource";
const MEAL_PLAN: &str = "MealPlanResource";

/// Message the API returns when a job ends before it begins.
const DATE_ORDER_MESSAGE: &str = "date must be after begin date";

/// Identifier combinations that must be rejected, by index into
/// [`PersonIds::params`](personcheck_core::PersonIds::params).
const IDENTIFIER_COMBINATIONS: &[&[usize]] = &[&[0, 1], &[0, 2], &[1, 2], &[0, 1, 2]];

pub(super) fn all() -> Vec<Scenario> {
    vec![
        Scenario {
            name: "person_by_id",
            schemas: &[PERSON],
            probes: &[],
            ready: |tc| {
                if tc.valid_osu_ids.is_empty() && tc.invalid_osu_ids.is_empty() {
                    Err("no valid_osu_ids or invalid_osu_ids configured".into())
                } else {
                    Ok(())
                }
            },
            run: person_by_id,
        },
        Scenario {
            name: "persons_by_identifiers",
            schemas: &[PERSONS],
            probes: &[],
            ready: |tc| require(tc.ids_person.is_some(), "ids_person"),
            run: persons_by_identifiers,
        },
        Scenario {
            name: "jobs",
            schemas: &[JOBS],
            probes: &["jobs"],
            ready: |tc| {
                require(
                    tc.jobs_person.is_some() || tc.no_job_person.is_some(),
                    "jobs_person or no_job_person",
                )
            },
            run: jobs,
        },
        Scenario {
            name: "image",
            schemas: &[IMAGE],
            probes: &["image"],
            ready: |tc| {
                require(
                    tc.person_or_default(tc.image_person.as_ref()).is_some(),
                    "image_person or valid_osu_ids",
                )
            },
            run: image,
        },
        Scenario {
            name: "phones",
            schemas: &[PHONES],
            probes: &["phones"],
            ready: |tc| {
                require(
                    tc.phones_person.is_some() || tc.long_phone_person.is_some(),
                    "phones_person or long_phone_person",
                )
            },
            run: phones,
        },
        Scenario {
            name: "addresses",
            schemas: &[ADDRESSES],
            probes: &["addresses"],
            ready: |tc| require(tc.addresses_person.is_some(), "addresses_person"),
            run: addresses,
        },
        Scenario {
            name: "emails",
            schemas: &[EMAILS],
            probes: &["emails"],
            ready: |tc| require(tc.emails_person.is_some(), "emails_person"),
            run: emails,
        },
        Scenario {
            name: "meal_plans",
            schemas: &[MEAL_PLANS, MEAL_PLAN],
            probes: &[],
            ready: |tc| require(tc.meal_plan_person.is_some(), "meal_plan_person"),
            run: meal_plans,
        },
    ]
}

fn require(present: bool, fixture: &str) -> Result<(), String> {
    if present {
        Ok(())
    } else {
        Err(format!("no {fixture} configured"))
    }
}

fn test_cases<'a>(rec: &Recorder<'a>) -> &'a TestCases {
    rec.ctx.test_cases()
}

fn person_by_id(rec: &mut Recorder<'_>) {
    let ctx = rec.ctx;
    let tc = test_cases(rec);
    for osu_id in &tc.valid_osu_ids {
        let path = format!("/{osu_id}");
        let options = CheckOptions::get()
            .with_rule(Rule::equals("/data/id", osu_id.as_str()))
            .with_rule(Rule::equals("/data/type", "person"))
            .with_rule(Rule::equals("/data/links/self", ctx.url(&path)));
        rec.check(&path, PERSON, 200, &options);
    }
    for osu_id in &tc.invalid_osu_ids {
        rec.check(&format!("/{osu_id}"), ERROR_OBJECT, 404, &CheckOptions::get());
    }
}

fn persons_by_identifiers(rec: &mut Recorder<'_>) {
    let ctx = rec.ctx;
    let Some(ids) = &test_cases(rec).ids_person else {
        return;
    };
    let params = ids.params();
    let names = &ids.names;
    let self_link = ctx.url(&format!("/{}", ids.osu_id));

    // One identifier alone finds the person, and always the same one
    let mut reference: Option<Value> = None;
    for (i, (name, value)) in params.into_iter().enumerate() {
        let mut options = CheckOptions::get()
            .with_query(name, value)
            .with_rule(Rule::min_items("/data", 1))
            .with_rule(Rule::equals("/data/*/id", ids.osu_id.as_str()))
            .with_rule(Rule::equals("/data/*/type", "person"))
            .with_rule(Rule::equals(
                &format!("/data/*/attributes/{}", names.onid_attribute),
                ids.onid.as_str(),
            ))
            .with_rule(Rule::equals(
                &format!("/data/*/attributes/{}", names.osuuid_attribute),
                ids.osuuid.as_str(),
            ))
            .with_rule(Rule::equals("/data/*/links/self", self_link.as_str()));
        if let Some(data) = &reference {
            options = options.with_rule(Rule::equals("/data", data.clone()));
        }
        let body = rec.check("", PERSONS, 200, &options);
        if i == 0 {
            reference = body.and_then(|mut b| b.get_mut("data").map(Value::take));
        }
    }

    // Identifiers are mutually exclusive
    for combination in IDENTIFIER_COMBINATIONS {
        let options = combination
            .iter()
            .map(|&i| params[i])
            .fold(CheckOptions::get(), |options, (name, value)| {
                options.with_query(name, value)
            });
        rec.check("", ERROR_OBJECT, 400, &options);
    }
}

fn jobs(rec: &mut Recorder<'_>) {
    let ctx = rec.ctx;
    let tc = test_cases(rec);

    if let Some(osu_id) = &tc.jobs_person {
        let path = format!("/{osu_id}/jobs");
        let options = CheckOptions::get()
            .with_rule(Rule::min_items("/data", 1))
            .with_rule(Rule::date_order("/data/*/attributes", "beginDate", "endDate"))
            .with_rule(Rule::numeric_range("/data/*/attributes/appointmentPercent", 0.0, 100.0))
            .with_rule(Rule::numeric_range("/data/*/attributes/fullTimeEquivalency", 0.0, 1.0))
            .with_rule(Rule::equals("/links/self", ctx.url(&path)));
        rec.check(&path, JOBS, 200, &options);
        rec.probe("jobs", "/{osuId}/jobs", JOBS, osu_id);

        if let Some(body) = &tc.valid_job_body {
            match invert_dates(body) {
                Some(inverted) => {
                    let options = CheckOptions::post(inverted).with_expected_message(DATE_ORDER_MESSAGE);
                    rec.check(&path, ERROR_OBJECT, 400, &options);
                }
                None => tracing::warn!(
                    "valid_job_body lacks distinct data.attributes.beginDate/endDate, date order check not run"
                ),
            }
        }
    }

    if let Some(osu_id) = &tc.no_job_person {
        let options = CheckOptions::get().with_rule(Rule::max_items("/data", 0));
        rec.check(&format!("/{osu_id}/jobs"), JOBS, 200, &options);
    }
}

/// Copy of a job body whose `beginDate` falls after its `endDate`.
///
/// `None` when either date is missing or both are equal.
fn invert_dates(body: &Value) -> Option<Value> {
    let mut body = body.clone();
    let attributes = body.pointer_mut("/data/attributes")?.as_object_mut()?;
    let begin = attributes.get("beginDate")?.as_str()?.to_string();
    let end = attributes.get("endDate")?.as_str()?.to_string();
    if begin == end {
        return None;
    }
    let (later, earlier) = if begin > end { (begin, end) } else { (end, begin) };
    attributes.insert("beginDate".into(), Value::String(later));
    attributes.insert("endDate".into(), Value::String(earlier));
    Some(body)
}

fn image(rec: &mut Recorder<'_>) {
    let tc = test_cases(rec);
    let Some(osu_id) = tc.person_or_default(tc.image_person.as_ref()) else {
        return;
    };

    let options = CheckOptions::get().with_content_type("image/jpeg");
    rec.check(&format!("/{osu_id}/image"), IMAGE, 200, &options);
    rec.probe("image", "/{osuId}/image", IMAGE, osu_id);

    // Errors stay JSON even on the image endpoint
    let rejected = rec
        .ctx
        .param_specs("image")
        .into_iter()
        .find_map(|spec| {
            let value = spec.invalid.first().map(query_value)?;
            Some((spec.name, value))
        });
    if let Some((name, value)) = rejected {
        let options = CheckOptions::get()
            .with_query(name, value)
            .with_content_type("application/json");
        rec.check(&format!("/{osu_id}/image"), ERROR_OBJECT, 400, &options);
    }
    if let Some(invalid) = tc.invalid_osu_ids.first() {
        let options = CheckOptions::get().with_content_type("application/json");
        rec.check(&format!("/{invalid}/image"), ERROR_OBJECT, 404, &options);
    }
}

const FULL_PHONE_NUMBER: &str = "/data/*/attributes/fullPhoneNumber";

fn phones(rec: &mut Recorder<'_>) {
    let tc = test_cases(rec);
    if let Some(osu_id) = &tc.phones_person {
        let options = CheckOptions::get().with_rule(Rule::e164(FULL_PHONE_NUMBER));
        rec.check(&format!("/{osu_id}/phones"), PHONES, 200, &options);
        rec.probe("phones", "/{osuId}/phones", PHONES, osu_id);
    }

    // Bad backend data is passed through, not reformatted
    if let Some(osu_id) = &tc.long_phone_person {
        let options = CheckOptions::get().with_rule(Rule::not_e164(FULL_PHONE_NUMBER));
        rec.check(&format!("/{osu_id}/phones"), PHONES, 200, &options);
    }
}

fn addresses(rec: &mut Recorder<'_>) {
    let Some(osu_id) = &test_cases(rec).addresses_person else {
        return;
    };
    rec.check(&format!("/{osu_id}/addresses"), ADDRESSES, 200, &CheckOptions::get());
    rec.probe("addresses", "/{osuId}/addresses", ADDRESSES, osu_id);
}

fn emails(rec: &mut Recorder<'_>) {
    let Some(osu_id) = &test_cases(rec).emails_person else {
        return;
    };
    rec.check(&format!("/{osu_id}/emails"), EMAILS, 200, &CheckOptions::get());
    rec.probe("emails", "/{osuId}/emails", EMAILS, osu_id);
}

fn meal_plans(rec: &mut Recorder<'_>) {
    let Some(osu_id) = &test_cases(rec).meal_plan_person else {
        return;
    };
    let path = format!("/{osu_id}/meal-plans");
    let Some(body) = rec.check(&path, MEAL_PLANS, 200, &CheckOptions::get()) else {
        return;
    };

    let ids: Vec<String> = Selector::parse("/data/*/id")
        .select(&body)
        .into_iter()
        .filter_map(|(_, id)| id.as_str().map(str::to_string))
        .collect();
    for id in ids {
        let options = CheckOptions::get().with_rule(Rule::equals("/data/id", id.as_str()));
        rec.check(&format!("{path}/{id}"), MEAL_PLAN, 200, &options);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn invert_dates_puts_begin_after_end() {
        let body = json!({"data": {"type": "jobs", "attributes": {
            "positionNumber": "C12345",
            "beginDate": "2019-01-01",
            "endDate": "2019-12-31"
        }}});
        let inverted = invert_dates(&body).unwrap();
        assert_eq!(inverted["data"]["attributes"]["beginDate"], "2019-12-31");
        assert_eq!(inverted["data"]["attributes"]["endDate"], "2019-01-01");
        assert_eq!(inverted["data"]["attributes"]["positionNumber"], "C12345");

        // Already inverted bodies stay inverted
        assert_eq!(invert_dates(&inverted).unwrap(), inverted);
    }

    #[test]
    fn invert_dates_needs_two_distinct_dates() {
        assert!(invert_dates(&json!({"data": {"attributes": {"beginDate": "2019-01-01"}}})).is_none());
        assert!(
            invert_dates(&json!({"data": {"attributes": {
                "beginDate": "2019-01-01",
                "endDate": "2019-01-01"
            }}}))
            .is_none()
        );
        assert!(invert_dates(&json!([])).is_none());
    }

    #[test]
    fn skip_reasons_name_the_missing_fixture() {
        let tc = TestCases {
            valid_osu_ids: vec![],
            ..TestCases::default()
        };
        let reasons: Vec<(&str, Option<String>)> = all()
            .iter()
            .map(|s| (s.name, s.skip_reason(&tc)))
            .collect();
        assert_eq!(reasons[0], ("person_by_id", None));
        assert_eq!(
            reasons[1],
            ("persons_by_identifiers", Some("no ids_person configured".into()))
        );
        assert_eq!(
            reasons[3],
            ("image", Some("no image_person or valid_osu_ids configured".into()))
        );
    }

    #[test]
    fn identifier_combinations_cover_every_pair() {
        for combination in IDENTIFIER_COMBINATIONS {
            assert!(combination.len() >= 2);
            assert!(combination.iter().all(|&i| i < 3));
        }
        assert_eq!(IDENTIFIER_COMBINATIONS.len(), 4);
    }
}
