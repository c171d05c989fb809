//! Parameter Store
//!
//! Role-gated setters for the market's risk parameters and collaborators.
//! Every setter checks the new value against the parameters it interacts
//! with, so the set stays consistent with `validate_parameters`:
//!
//! | Code | Parameter                | Constraint                    |
//! |------|--------------------------|-------------------------------|
//! | CF   | collateral factor        | `CF <= LS`                    |
//! | THF  | target health factor     | `THF >= 1`                    |
//! | BF   | borrow fee               | `BF <= 1`                     |
//! | RF   | repay fee                | `RF + LS <= 1`                |
//! | IR   | interest rate            | accrues at the old rate first |
//! | LS   | liquidation surcharge    | `CF <= LS`, `LS + RF <= 1`    |
//! | MLD  | max liquidation discount | `MLD < 1`                     |

use std::sync::Arc;

use vaultkit_common::{
    constants::base::BASE_PARAMS,
    errors::{VaultError, VaultResult},
    events::VaultEvent,
    ledger::AssetLedger,
    math::safe_sub,
    types::{Address, CallContext, ParameterType, TreasuryAccrual, ZERO_ADDRESS},
    BoostCurve, BoostSource, Oracle, Treasury,
};

use crate::{VaultManager, LOG_TARGET};

impl VaultManager {
    /// Set a parameter by its short code
    ///
    /// # Errors
    /// `InvalidParameterType` for an unknown code, then as `set_parameter`.
    pub fn set_uint64(&mut self, ctx: &CallContext, value: u64, code: &str) -> VaultResult<()> {
        let parameter = ParameterType::from_code(code)?;
        self.set_parameter(ctx, parameter, value)
    }

    /// Set one risk parameter (governor or guardian)
    pub fn set_parameter(&mut self, ctx: &CallContext, parameter: ParameterType, value: u64) -> VaultResult<()> {
        self.require_governor_or_guardian(&ctx.caller)?;
        let base = BASE_PARAMS as u64;
        let params = &self.state.params;

        match parameter {
            ParameterType::CollateralFactor => {
                if value > params.liquidation_surcharge {
                    return Err(too_high("collateral_factor", value));
                }
                self.state.params.collateral_factor = value;
            }
            ParameterType::TargetHealthFactor => {
                if value < base {
                    return Err(VaultError::TooSmallParameterValue {
                        parameter: "target_health_factor",
                        value: value as u128,
                    });
                }
                self.state.params.target_health_factor = value;
            }
            ParameterType::BorrowFee => {
                if value > base {
                    return Err(too_high("borrow_fee", value));
                }
                self.state.params.borrow_fee = value;
            }
            ParameterType::RepayFee => {
                if value as u128 + params.liquidation_surcharge as u128 > BASE_PARAMS {
                    return Err(too_high("repay_fee", value));
                }
                self.state.params.repay_fee = value;
            }
            ParameterType::InterestRate => {
                // Interest up to now is owed at the old rate
                self.accrue_interest(ctx.timestamp)?;
                self.state.params.interest_rate = value;
            }
            ParameterType::LiquidationSurcharge => {
                if value == 0
                    || params.collateral_factor > value
                    || value as u128 + params.repay_fee as u128 > BASE_PARAMS
                {
                    return Err(VaultError::InvalidParameterValue {
                        parameter: "liquidation_surcharge",
                    });
                }
                self.state.params.liquidation_surcharge = value;
            }
            ParameterType::MaxLiquidationDiscount => {
                if value >= base {
                    return Err(too_high("max_liquidation_discount", value));
                }
                self.state.params.max_liquidation_discount = value;
            }
        }

        self.events.emit(VaultEvent::ParameterUpdated {
            parameter,
            value,
            timestamp: ctx.timestamp,
        });
        log::info!(target: LOG_TARGET, "{} set to {}", parameter.code(), value);
        Ok(())
    }

    /// Set the debt ceiling (governor or guardian)
    ///
    /// A ceiling below the current debt only blocks further borrowing.
    pub fn set_debt_ceiling(&mut self, ctx: &CallContext, debt_ceiling: u128) -> VaultResult<()> {
        self.require_governor_or_guardian(&ctx.caller)?;
        self.state.params.debt_ceiling = debt_ceiling;
        self.events.emit(VaultEvent::DebtCeilingUpdated {
            debt_ceiling,
            timestamp: ctx.timestamp,
        });
        log::info!(target: LOG_TARGET, "debt ceiling set to {}", debt_ceiling);
        Ok(())
    }

    /// Set the three dust thresholds (governor)
    pub fn set_dusts(
        &mut self,
        ctx: &CallContext,
        dust: u128,
        dust_liquidation: u128,
        dust_collateral: u128,
    ) -> VaultResult<()> {
        self.require_governor(&ctx.caller)?;
        if dust > dust_liquidation {
            return Err(VaultError::InvalidParameterValue { parameter: "dust" });
        }
        self.state.params.dust = dust;
        self.state.params.dust_liquidation = dust_liquidation;
        self.state.params.dust_collateral = dust_collateral;
        self.events.emit(VaultEvent::DustUpdated {
            dust,
            dust_liquidation,
            dust_collateral,
            timestamp: ctx.timestamp,
        });
        Ok(())
    }

    /// Replace the boost curve and its balance source (governor or guardian)
    ///
    /// Without a source every liquidator gets `y_boost[0]`.
    ///
    /// # Errors
    /// `InvalidSetOfParameters` when the curve is malformed.
    pub fn set_liquidation_boost_parameters(
        &mut self,
        ctx: &CallContext,
        boost_source: Option<Box<dyn BoostSource>>,
        x_boost: Vec<u128>,
        y_boost: Vec<u64>,
    ) -> VaultResult<()> {
        self.require_governor_or_guardian(&ctx.caller)?;
        let curve = BoostCurve::new(x_boost.clone(), y_boost.clone())?;

        self.state.params.base_boost = curve.base_boost();
        self.state.boost_curve = curve;
        let boost_source_set = boost_source.is_some();
        self.boost_source = boost_source;

        self.events.emit(VaultEvent::LiquidationBoostParametersUpdated {
            boost_source_set,
            x_boost,
            y_boost,
            timestamp: ctx.timestamp,
        });
        log::info!(
            target: LOG_TARGET,
            "boost curve replaced, base boost {}, source set: {}",
            self.state.params.base_boost,
            boost_source_set
        );
        Ok(())
    }

    /// Pause or unpause user operations (governor or guardian)
    pub fn toggle_pause(&mut self, ctx: &CallContext) -> VaultResult<()> {
        self.require_governor_or_guardian(&ctx.caller)?;
        self.state.paused = !self.state.paused;
        self.events.emit(VaultEvent::PauseToggled {
            paused: self.state.paused,
            timestamp: ctx.timestamp,
        });
        log::warn!(target: LOG_TARGET, "{} paused: {}", self.state.name, self.state.paused);
        Ok(())
    }

    /// Replace the price source (governor)
    pub fn set_oracle(&mut self, ctx: &CallContext, oracle: Box<dyn Oracle>) -> VaultResult<()> {
        self.require_governor(&ctx.caller)?;
        self.oracle = oracle;
        self.events.emit(VaultEvent::OracleUpdated { timestamp: ctx.timestamp });
        log::info!(target: LOG_TARGET, "oracle replaced");
        Ok(())
    }

    /// Hand the engine over to a new treasury (current treasury only)
    ///
    /// # Errors
    /// `NotTreasury`, or `InvalidParameterValue` when the new treasury serves
    /// another stablecoin.
    pub fn set_treasury(&mut self, ctx: &CallContext, treasury: Arc<dyn Treasury>) -> VaultResult<()> {
        self.require_treasury(&ctx.caller)?;
        if treasury.stablecoin() != self.state.stablecoin {
            return Err(VaultError::InvalidParameterValue { parameter: "treasury" });
        }
        let address = treasury.address();
        self.state.treasury = address;
        self.treasury = treasury;
        self.events.emit(VaultEvent::TreasuryUpdated {
            treasury: address,
            timestamp: ctx.timestamp,
        });
        log::info!(target: LOG_TARGET, "treasury moved");
        Ok(())
    }

    /// Toggle an account on the whitelist (governor)
    ///
    /// The zero address toggles whitelisting itself.
    pub fn toggle_whitelist(&mut self, ctx: &CallContext, account: Address) -> VaultResult<()> {
        self.require_governor(&ctx.caller)?;
        let whitelisted = if account == ZERO_ADDRESS {
            self.state.params.whitelisting_activated = !self.state.params.whitelisting_activated;
            self.state.params.whitelisting_activated
        } else {
            self.state.registry.toggle_whitelisted(account)
        };
        self.events.emit(VaultEvent::WhitelistToggled {
            account,
            whitelisted,
            timestamp: ctx.timestamp,
        });
        Ok(())
    }

    /// Net surplus against bad debt and pay the treasury (treasury only)
    ///
    /// A positive net is minted to the treasury; a negative net is returned
    /// as the bad debt the surplus could not cover. Both counters reset.
    pub fn accrue_interest_to_treasury<L>(&mut self, ctx: &CallContext, ledger: &mut L) -> VaultResult<TreasuryAccrual>
    where
        L: AssetLedger + Clone,
    {
        self.atomically(ledger, &mut [], |manager, ledger, _| {
            manager.require_treasury(&ctx.caller)?;
            manager.accrue_interest(ctx.timestamp)?;

            let surplus = manager.state.surplus;
            let bad_debt = manager.state.bad_debt;
            let accrual = if surplus >= bad_debt {
                TreasuryAccrual {
                    surplus: safe_sub(surplus, bad_debt)?,
                    bad_debt: 0,
                }
            } else {
                TreasuryAccrual {
                    surplus: 0,
                    bad_debt: safe_sub(bad_debt, surplus)?,
                }
            };
            manager.state.surplus = 0;
            manager.state.bad_debt = 0;

            if accrual.surplus > 0 {
                let stablecoin = manager.state.stablecoin;
                let engine = manager.state.address;
                let treasury = manager.state.treasury;
                ledger.mint(&stablecoin, &engine, &treasury, accrual.surplus, ctx.timestamp)?;
            }
            manager.events.emit(VaultEvent::AccruedToTreasury {
                surplus: accrual.surplus,
                bad_debt: accrual.bad_debt,
                timestamp: ctx.timestamp,
            });
            log::info!(
                target: LOG_TARGET,
                "accrued {} to treasury, {} bad debt uncovered",
                accrual.surplus,
                accrual.bad_debt
            );
            Ok(accrual)
        })
    }
}

fn too_high(parameter: &'static str, value: u64) -> VaultError {
    VaultError::TooHighParameterValue {
        parameter,
        value: value as u128,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_utils::*;
    use vaultkit_common::{
        constants::base::BASE_INTEREST,
        types::{Action, VaultParameters},
        TreasuryRoles,
    };
    use vaultkit_price_oracle::SharedPriceFeed;

    #[test]
    fn test_set_uint64_codes() {
        let mut env = TestEnv::new(default_test_params());
        let ctx = env.ctx(GUARDIAN);

        env.manager.set_uint64(&ctx, 700_000_000, "CF").unwrap();
        env.manager.set_uint64(&ctx, 1_200_000_000, "THF").unwrap();
        env.manager.set_uint64(&ctx, 5_000_000, "BF").unwrap();
        env.manager.set_uint64(&ctx, 5_000_000, "RF").unwrap();
        env.manager.set_uint64(&ctx, 80_000_000, "MLD").unwrap();

        let params = env.manager.params();
        assert_eq!(params.collateral_factor, 700_000_000);
        assert_eq!(params.target_health_factor, 1_200_000_000);
        assert_eq!(params.borrow_fee, 5_000_000);
        assert_eq!(params.repay_fee, 5_000_000);
        assert_eq!(params.max_liquidation_discount, 80_000_000);

        let result = env.manager.set_uint64(&ctx, 1, "XX");
        assert!(matches!(result, Err(VaultError::InvalidParameterType)));
    }

    #[test]
    fn test_parameter_bounds() {
        let mut env = TestEnv::new(default_test_params());
        let ctx = env.ctx(GOVERNOR);

        // LS is 0.9
        assert!(matches!(
            env.manager.set_uint64(&ctx, 950_000_000, "CF"),
            Err(VaultError::TooHighParameterValue { parameter: "collateral_factor", .. })
        ));
        assert!(matches!(
            env.manager.set_uint64(&ctx, 999_999_999, "THF"),
            Err(VaultError::TooSmallParameterValue { .. })
        ));
        assert!(matches!(
            env.manager.set_uint64(&ctx, 1_000_000_001, "BF"),
            Err(VaultError::TooHighParameterValue { .. })
        ));
        assert!(matches!(
            env.manager.set_uint64(&ctx, 100_000_001, "RF"),
            Err(VaultError::TooHighParameterValue { .. })
        ));
        assert!(matches!(
            env.manager.set_uint64(&ctx, 1_000_000_000, "MLD"),
            Err(VaultError::TooHighParameterValue { .. })
        ));
        // CF is 0.8
        assert!(matches!(
            env.manager.set_uint64(&ctx, 700_000_000, "LS"),
            Err(VaultError::InvalidParameterValue { .. })
        ));
        assert!(matches!(
            env.manager.set_uint64(&ctx, 0, "LS"),
            Err(VaultError::InvalidParameterValue { .. })
        ));

        // Boundaries are accepted
        env.manager.set_uint64(&ctx, 100_000_000, "RF").unwrap();
        env.manager.set_uint64(&ctx, 900_000_000, "CF").unwrap();
        env.manager.set_uint64(&ctx, 1_000_000_000, "THF").unwrap();
        assert!(crate::validate_parameters(env.manager.params()).is_ok());
    }

    #[test]
    fn test_setters_require_roles() {
        let mut env = TestEnv::new(default_test_params());
        let alice = env.ctx(ALICE);
        let guardian = env.ctx(GUARDIAN);

        assert!(matches!(
            env.manager.set_uint64(&alice, 1, "BF"),
            Err(VaultError::NotGovernorOrGuardian { .. })
        ));
        assert!(matches!(
            env.manager.set_debt_ceiling(&alice, 1),
            Err(VaultError::NotGovernorOrGuardian { .. })
        ));
        assert!(matches!(env.manager.toggle_pause(&alice), Err(VaultError::NotGovernorOrGuardian { .. })));
        // Governor only
        assert!(matches!(
            env.manager.set_dusts(&guardian, 0, 0, 0),
            Err(VaultError::NotGovernor { .. })
        ));
        assert!(matches!(
            env.manager.toggle_whitelist(&guardian, ALICE),
            Err(VaultError::NotGovernor { .. })
        ));
        assert!(matches!(
            env.manager.set_oracle(&guardian, Box::new(test_feed())),
            Err(VaultError::NotGovernor { .. })
        ));
        assert!(matches!(
            env.manager.set_treasury(&guardian, Arc::new(treasury_roles())),
            Err(VaultError::NotTreasury { .. })
        ));
    }

    #[test]
    fn test_interest_rate_change_accrues_first() {
        let params = VaultParameters { interest_rate: 1_000_000_000_000_000_000, ..default_test_params() };
        let mut env = TestEnv::new(params);
        env.open_vault(ALICE, 100 * ONE, 10 * ONE);
        env.advance(1_000);
        let expected = env.manager.current_accumulator(env.now).unwrap();

        let ctx = env.ctx(GOVERNOR);
        env.manager.set_uint64(&ctx, 0, "IR").unwrap();
        assert_eq!(env.manager.interest_accumulator(), expected);
        assert!(env.manager.surplus() > 0);

        // Rate 0 from now on
        env.advance(1_000);
        assert_eq!(env.manager.current_accumulator(env.now).unwrap(), expected);
        assert!(expected > BASE_INTEREST);
    }

    #[test]
    fn test_set_dusts() {
        let mut env = TestEnv::new(default_test_params());
        let ctx = env.ctx(GOVERNOR);

        let result = env.manager.set_dusts(&ctx, 2 * ONE, ONE, ONE);
        assert!(matches!(result, Err(VaultError::InvalidParameterValue { parameter: "dust" })));

        env.manager.set_dusts(&ctx, ONE, 2 * ONE, 3 * ONE).unwrap();
        let params = env.manager.params();
        assert_eq!((params.dust, params.dust_liquidation, params.dust_collateral), (ONE, 2 * ONE, 3 * ONE));
    }

    #[test]
    fn test_debt_ceiling_blocks_new_borrows_only() {
        let mut env = TestEnv::new(default_test_params());
        let vault_id = env.open_vault(ALICE, 100 * ONE, 10 * ONE);
        let ctx = env.ctx(GUARDIAN);
        env.manager.set_debt_ceiling(&ctx, 5 * ONE).unwrap();
        assert_eq!(env.manager.debt_ceiling(), 5 * ONE);

        let result = env.angle(ALICE, vec![Action::Borrow { vault_id, amount: ONE }], ALICE, ALICE);
        assert!(matches!(result, Err(VaultError::DebtCeilingExceeded { .. })));

        // Repaying above the ceiling is fine
        env.angle(ALICE, vec![Action::RepayDebt { vault_id, amount: ONE }], ALICE, ALICE)
            .unwrap();
    }

    #[test]
    fn test_toggle_pause_blocks_batches() {
        let mut env = TestEnv::new(default_test_params());
        let vault_id = env.open_vault(ALICE, 10 * ONE, 0);
        let ctx = env.ctx(GUARDIAN);

        env.manager.toggle_pause(&ctx).unwrap();
        assert!(env.manager.is_paused());
        let result = env.angle(ALICE, vec![Action::AddCollateral { vault_id, amount: ONE }], ALICE, ALICE);
        assert!(matches!(result, Err(VaultError::PausedCollateral)));

        env.manager.toggle_pause(&ctx).unwrap();
        env.angle(ALICE, vec![Action::AddCollateral { vault_id, amount: ONE }], ALICE, ALICE)
            .unwrap();
    }

    #[test]
    fn test_invalid_boost_curve_rejected() {
        let mut env = TestEnv::new(default_test_params());
        let ctx = env.ctx(GOVERNOR);

        let result = env.manager.set_liquidation_boost_parameters(&ctx, None, vec![0, 10], vec![2_000_000_000, 1_000_000_000]);
        assert!(matches!(result, Err(VaultError::InvalidSetOfParameters { .. })));

        env.manager
            .set_liquidation_boost_parameters(&ctx, None, vec![0], vec![2_000_000_000])
            .unwrap();
        assert_eq!(env.manager.params().base_boost, 2_000_000_000);
        assert_eq!(env.manager.liquidation_boost(&LIQUIDATOR), 2_000_000_000);
    }

    #[test]
    fn test_set_oracle_switches_price() {
        let mut env = TestEnv::new(default_test_params());
        let vault_id = env.open_vault(ALICE, 10 * ONE, 10 * ONE);
        let ctx = env.ctx(GOVERNOR);

        // CF 0.8 at price 1: hf 0.8
        let feed = SharedPriceFeed::with_price(ORACLE_OPERATOR, ONE, env.now);
        env.manager.set_oracle(&ctx, Box::new(feed)).unwrap();
        assert_eq!(env.manager.vault_health_factor(vault_id, env.now).unwrap(), 800_000_000);
    }

    #[test]
    fn test_set_treasury() {
        let mut env = TestEnv::new(default_test_params());
        let ctx = env.ctx(TREASURY);
        let new_address = [0x77u8; 32];

        let other_stable = TreasuryRoles::new(new_address, [0x78u8; 32], GOVERNOR).unwrap();
        let result = env.manager.set_treasury(&ctx, Arc::new(other_stable));
        assert!(matches!(result, Err(VaultError::InvalidParameterValue { parameter: "treasury" })));

        let replacement = TreasuryRoles::new(new_address, STABLECOIN, GOVERNOR).unwrap();
        env.manager.set_treasury(&ctx, Arc::new(replacement)).unwrap();
        assert_eq!(env.manager.treasury_address(), new_address);

        // The old treasury lost its rights
        let result = env.manager.set_treasury(&ctx, Arc::new(treasury_roles()));
        assert!(matches!(result, Err(VaultError::NotTreasury { .. })));
    }

    #[test]
    fn test_whitelist_toggles() {
        let mut env = TestEnv::new(default_test_params());
        let ctx = env.ctx(GOVERNOR);

        env.manager.toggle_whitelist(&ctx, ZERO_ADDRESS).unwrap();
        assert!(env.manager.params().whitelisting_activated);
        let result = env.angle(ALICE, vec![Action::CreateVault { to: ALICE }], ALICE, ALICE);
        assert!(matches!(result, Err(VaultError::NotWhitelisted { .. })));

        env.manager.toggle_whitelist(&ctx, ALICE).unwrap();
        assert!(env.manager.is_whitelisted(&ALICE));
        env.angle(ALICE, vec![Action::CreateVault { to: ALICE }], ALICE, ALICE).unwrap();

        env.manager.toggle_whitelist(&ctx, ALICE).unwrap();
        assert!(!env.manager.is_whitelisted(&ALICE));
    }

    #[test]
    fn test_accrual_mints_net_surplus() {
        let params = VaultParameters { borrow_fee: 10_000_000, ..default_test_params() };
        let mut env = TestEnv::new(params);
        env.open_vault(ALICE, 100 * ONE, 10 * ONE);
        // 1% of 10
        assert_eq!(env.manager.surplus(), ONE / 10);

        let alice = env.ctx(ALICE);
        let result = env.manager.accrue_interest_to_treasury(&alice, &mut env.ledger);
        assert!(matches!(result, Err(VaultError::NotTreasury { .. })));

        let ctx = env.ctx(TREASURY);
        let accrual = env.manager.accrue_interest_to_treasury(&ctx, &mut env.ledger).unwrap();
        assert_eq!(accrual, TreasuryAccrual { surplus: ONE / 10, bad_debt: 0 });
        assert_eq!(env.stable_balance(&TREASURY), ONE / 10);
        assert_eq!(env.manager.surplus(), 0);

        // Nothing left to pay
        let accrual = env.manager.accrue_interest_to_treasury(&ctx, &mut env.ledger).unwrap();
        assert_eq!(accrual, TreasuryAccrual::default());
    }

    #[test]
    fn test_accrual_reports_uncovered_bad_debt() {
        let mut env = TestEnv::new(default_test_params());
        env.manager.state.surplus = 2 * ONE;
        env.manager.state.bad_debt = 5 * ONE;

        let ctx = env.ctx(TREASURY);
        let accrual = env.manager.accrue_interest_to_treasury(&ctx, &mut env.ledger).unwrap();
        assert_eq!(accrual, TreasuryAccrual { surplus: 0, bad_debt: 3 * ONE });
        assert_eq!(env.manager.bad_debt(), 0);
        assert_eq!(env.stable_balance(&TREASURY), 0);
    }
}
