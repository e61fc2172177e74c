use crate::{config::ComfortParams, error::ConfigError};

fn internal_gain_offset(params: &ComfortParams) -> Result<f32, ConfigError> {
    if !params.ua_total.is_finite() {
        return Err(ConfigError::NonFinite("ua_total"));
    }
    if params.ua_total <= 0.0 {
        return Err(ConfigError::NonPositiveConductance(params.ua_total));
    }
    Ok(params.q_int / params.ua_total)
}

pub fn cooling_balance_temp(params: &ComfortParams) -> Result<f32, ConfigError> {
    Ok(params.tc_base - internal_gain_offset(params)?)
}

pub fn heating_balance_temp(params: &ComfortParams) -> Result<f32, ConfigError> {
    Ok(params.th_base - internal_gain_offset(params)?)
}

// Above the balance point the slope is derived from the same distance it is
// applied to, so the result is `tc_min` for every `t_out` past the balance
// temperature.
pub fn tset_cool(t_out: f32, params: &ComfortParams) -> Result<f32, ConfigError> {
    let t_bal = cooling_balance_temp(params)?;
    if t_out <= t_bal {
        return Ok(params.tc_base);
    }

    let k_cool = (params.tc_base - params.tc_min) / (t_out - t_bal);
    Ok(params.tc_base - k_cool * (t_out - t_bal))
}

pub fn tset_heat(t_out: f32, params: &ComfortParams) -> Result<f32, ConfigError> {
    let t_bal = heating_balance_temp(params)?;
    if t_out >= t_bal {
        return Ok(params.th_base);
    }

    Ok(params.th_base + params.k_heat * (t_bal - t_out))
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Curve {
    Cooling,
    Heating,
}

pub fn adaptive_setpoint(t_out: f32, params: &ComfortParams) -> Result<(Curve, f32), ConfigError> {
    if !t_out.is_finite() {
        return Err(ConfigError::NonFinite("t_out"));
    }

    let (curve, raw) = if t_out > cooling_balance_temp(params)? {
        (Curve::Cooling, tset_cool(t_out, params)?)
    } else {
        (Curve::Heating, tset_heat(t_out, params)?)
    };

    if !raw.is_finite() {
        return Err(ConfigError::NonFinite("setpoint"));
    }
    Ok((curve, round_tenth(raw)))
}

pub fn round_tenth(value: f32) -> f32 {
    (value * 10.0).round() / 10.0
}

#[cfg(test)]
mod tests {
    use pretty_assertions::assert_eq;
    use proptest::prelude::*;

    use super::*;

    fn scenario_params() -> ComfortParams {
        ComfortParams {
            tc_base: 25.5,
            tc_min: 23.0,
            ua_total: 30.0,
            q_int: 200.0,
            ..ComfortParams::default()
        }
    }

    #[test]
    fn balance_temperature_subtracts_internal_gain() {
        let t_bal = cooling_balance_temp(&scenario_params()).unwrap();
        assert!((t_bal - 18.833_334).abs() < 1e-4);
    }

    #[test]
    fn cooling_below_balance_keeps_base() {
        assert_eq!(tset_cool(15.0, &scenario_params()).unwrap(), 25.5);
    }

    #[test]
    fn cooling_above_balance_collapses_to_floor() {
        let sp = tset_cool(22.0, &scenario_params()).unwrap();
        assert!((sp - 23.0).abs() < 1e-4, "got {sp}");
    }

    #[test]
    fn heating_below_balance_rises_with_slope() {
        let params = ComfortParams::default();
        let t_bal = heating_balance_temp(&params).unwrap();
        let sp = tset_heat(t_bal - 10.0, &params).unwrap();
        assert!((sp - (params.th_base + 1.8)).abs() < 1e-4, "got {sp}");
    }

    #[test]
    fn zero_conductance_fails_fast() {
        let params = ComfortParams {
            ua_total: 0.0,
            ..ComfortParams::default()
        };
        assert_eq!(
            tset_cool(30.0, &params),
            Err(ConfigError::NonPositiveConductance(0.0))
        );
        assert_eq!(
            tset_heat(0.0, &params),
            Err(ConfigError::NonPositiveConductance(0.0))
        );
        assert!(adaptive_setpoint(10.0, &params).is_err());
    }

    #[test]
    fn selects_cooling_curve_above_balance() {
        let (curve, sp) = adaptive_setpoint(22.0, &scenario_params()).unwrap();
        assert_eq!(curve, Curve::Cooling);
        assert_eq!(sp, 23.0);
    }

    #[test]
    fn selects_heating_curve_at_or_below_balance() {
        let params = scenario_params();
        let t_bal = cooling_balance_temp(&params).unwrap();

        let (curve, sp) = adaptive_setpoint(t_bal, &params).unwrap();
        assert_eq!(curve, Curve::Heating);
        assert_eq!(sp, params.th_base);

        let (curve, sp) = adaptive_setpoint(-5.0, &params).unwrap();
        assert_eq!(curve, Curve::Heating);
        // 20.5 + 0.18 * (13.8333 + 5)
        assert_eq!(sp, 23.9);
    }

    #[test]
    fn rounds_to_one_decimal() {
        assert_eq!(round_tenth(23.04), 23.0);
        assert_eq!(round_tenth(23.06), 23.1);
        assert_eq!(round_tenth(-2.25), -2.3);
    }

    proptest! {
        #[test]
        fn cooling_is_base_up_to_balance(offset in 0.0f32..60.0) {
            let params = scenario_params();
            let t_out = cooling_balance_temp(&params).unwrap() - offset;
            prop_assert_eq!(tset_cool(t_out, &params).unwrap(), params.tc_base);
        }

        #[test]
        fn cooling_is_floor_past_balance(offset in 0.01f32..40.0) {
            let params = scenario_params();
            let t_out = cooling_balance_temp(&params).unwrap() + offset;
            let sp = tset_cool(t_out, &params).unwrap();
            prop_assert!((sp - params.tc_min).abs() < 1e-3, "got {}", sp);
            prop_assert_eq!(round_tenth(sp), params.tc_min);
        }

        #[test]
        fn heating_is_base_from_balance_up(offset in 0.0f32..60.0) {
            let params = ComfortParams::default();
            let t_out = heating_balance_temp(&params).unwrap() + offset;
            prop_assert_eq!(tset_heat(t_out, &params).unwrap(), params.th_base);
        }
    }
}
