//! Field-equality rules used by the maternal death and family planning
//! indicators.

use super::{Rule, SafeMap};

const MATERNAL_DEATH_CAUSE_FIELD_NAME: &str = "maternalDeathCause";
const NEW_FP_METHOD_FIELD_NAME: &str = "newMethod";

const ABORTION_VALUE: &str = "abortion";
const SEPSIS_VALUE: &str = "sepsis";
const HIGH_FEVER_VALUE: &str = "high_fever";

const CENTCHROMAN_FP_METHOD_VALUE: &str = "centchroman";
const CONDOM_FP_METHOD_VALUE: &str = "condom";
const OCP_FP_METHOD_VALUE: &str = "ocp";
const IUD_FP_METHOD_VALUE: &str = "iud";

fn field_equals_ignore_case(fields: &SafeMap, field: &str, expected: &str) -> bool {
    fields
        .get(field)
        .is_some_and(|value| value.eq_ignore_ascii_case(expected))
}

pub struct IsDeathDueToAbortionRule;

impl Rule for IsDeathDueToAbortionRule {
    fn apply(&self, fields: &SafeMap) -> bool {
        field_equals_ignore_case(fields, MATERNAL_DEATH_CAUSE_FIELD_NAME, ABORTION_VALUE)
    }
}

pub struct IsDeathDueToSepsisRule;

impl Rule for IsDeathDueToSepsisRule {
    fn apply(&self, fields: &SafeMap) -> bool {
        field_equals_ignore_case(fields, MATERNAL_DEATH_CAUSE_FIELD_NAME, SEPSIS_VALUE)
    }
}

pub struct IsDeathDueToHighFeverRule;

impl Rule for IsDeathDueToHighFeverRule {
    fn apply(&self, fields: &SafeMap) -> bool {
        field_equals_ignore_case(fields, MATERNAL_DEATH_CAUSE_FIELD_NAME, HIGH_FEVER_VALUE)
    }
}

pub struct NewFPMethodIsCentchromanPillsRule;

impl Rule for NewFPMethodIsCentchromanPillsRule {
    fn apply(&self, fields: &SafeMap) -> bool {
        field_equals_ignore_case(fields, NEW_FP_METHOD_FIELD_NAME, CENTCHROMAN_FP_METHOD_VALUE)
    }
}

pub struct NewFPMethodIsCondomRule;

impl Rule for NewFPMethodIsCondomRule {
    fn apply(&self, fields: &SafeMap) -> bool {
        field_equals_ignore_case(fields, NEW_FP_METHOD_FIELD_NAME, CONDOM_FP_METHOD_VALUE)
    }
}

pub struct NewFPMethodIsOCPRule;

impl Rule for NewFPMethodIsOCPRule {
    fn apply(&self, fields: &SafeMap) -> bool {
        field_equals_ignore_case(fields, NEW_FP_METHOD_FIELD_NAME, OCP_FP_METHOD_VALUE)
    }
}

pub struct NewFPMethodIsIUDRule;

impl Rule for NewFPMethodIsIUDRule {
    fn apply(&self, fields: &SafeMap) -> bool {
        field_equals_ignore_case(fields, NEW_FP_METHOD_FIELD_NAME, IUD_FP_METHOD_VALUE)
    }
}
