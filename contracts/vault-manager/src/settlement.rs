//! Settlement
//!
//! A batch nets its token flows into one `PaymentData` and settles it at the
//! end. Stablecoins owed by the user are burnt from `from` with the caller
//! as spender; stablecoins due to the user are minted to `to`. Collateral is
//! pulled from `from` into the engine and released from the engine to `to`.
//!
//! When a swapper is supplied it runs between the outbound and the inbound
//! leg, so released tokens can be converted into the tokens still owed.

use vaultkit_common::{
    errors::VaultResult,
    ledger::{AssetLedger, SwapRequest, Swapper},
    types::{Address, CallContext, PaymentData},
};

use crate::VaultManager;

impl VaultManager {
    #[allow(clippy::too_many_arguments)]
    pub(crate) fn settle<L: AssetLedger>(
        &mut self,
        ctx: &CallContext,
        payment: &PaymentData,
        from: &Address,
        to: &Address,
        data: &[u8],
        ledger: &mut L,
        swapper: Option<&mut dyn Swapper>,
    ) -> VaultResult<()> {
        let engine = self.state.address;
        let stablecoin = self.state.stablecoin;
        let collateral = self.state.collateral;
        let now = ctx.timestamp;

        if payment.stablecoin_amount_to_receive >= payment.stablecoin_amount_to_give {
            let stablecoin_payment = payment.stablecoin_amount_to_receive - payment.stablecoin_amount_to_give;
            if payment.collateral_amount_to_give >= payment.collateral_amount_to_receive {
                let collateral_payment = payment.collateral_amount_to_give - payment.collateral_amount_to_receive;
                self.handle_repay(ctx, collateral_payment, stablecoin_payment, from, to, data, ledger, swapper)
            } else {
                if stablecoin_payment > 0 {
                    ledger.burn_from(&stablecoin, &engine, from, &ctx.caller, stablecoin_payment, now)?;
                }
                let collateral_payment = payment.collateral_amount_to_receive - payment.collateral_amount_to_give;
                ledger.transfer_from(&collateral, &ctx.caller, from, &engine, collateral_payment, now)
            }
        } else {
            let stablecoin_payment = payment.stablecoin_amount_to_give - payment.stablecoin_amount_to_receive;
            ledger.mint(&stablecoin, &engine, to, stablecoin_payment, now)?;

            if payment.collateral_amount_to_give >= payment.collateral_amount_to_receive {
                let collateral_payment = payment.collateral_amount_to_give - payment.collateral_amount_to_receive;
                if collateral_payment > 0 {
                    ledger.transfer(&collateral, &engine, to, collateral_payment, now)?;
                }
                Ok(())
            } else {
                // Leverage: the minted stablecoins buy the collateral still owed
                let collateral_payment = payment.collateral_amount_to_receive - payment.collateral_amount_to_give;
                if let Some(swapper) = swapper {
                    let request = SwapRequest {
                        initiator: ctx.caller,
                        in_token: stablecoin,
                        out_token: collateral,
                        out_token_recipient: *from,
                        out_token_owed: collateral_payment,
                        in_token_obtained: stablecoin_payment,
                        data,
                        timestamp: now,
                    };
                    swapper.swap(&mut *ledger, &request)?;
                }
                ledger.transfer_from(&collateral, &ctx.caller, from, &engine, collateral_payment, now)
            }
        }
    }

    /// Release collateral to `to`, then burn the stablecoins owed from `from`
    ///
    /// Shared by batches and liquidations.
    #[allow(clippy::too_many_arguments)]
    pub(crate) fn handle_repay<L: AssetLedger>(
        &mut self,
        ctx: &CallContext,
        collateral_amount_to_give: u128,
        stablecoin_amount_to_repay: u128,
        from: &Address,
        to: &Address,
        data: &[u8],
        ledger: &mut L,
        swapper: Option<&mut dyn Swapper>,
    ) -> VaultResult<()> {
        let engine = self.state.address;
        let stablecoin = self.state.stablecoin;
        let collateral = self.state.collateral;
        let now = ctx.timestamp;

        if collateral_amount_to_give > 0 {
            ledger.transfer(&collateral, &engine, to, collateral_amount_to_give, now)?;
        }
        if stablecoin_amount_to_repay > 0 {
            if let Some(swapper) = swapper {
                let request = SwapRequest {
                    initiator: ctx.caller,
                    in_token: collateral,
                    out_token: stablecoin,
                    out_token_recipient: *from,
                    out_token_owed: stablecoin_amount_to_repay,
                    in_token_obtained: collateral_amount_to_give,
                    data,
                    timestamp: now,
                };
                swapper.swap(&mut *ledger, &request)?;
            }
            ledger.burn_from(&stablecoin, &engine, from, &ctx.caller, stablecoin_amount_to_repay, now)?;
        }
        Ok(())
    }
}
