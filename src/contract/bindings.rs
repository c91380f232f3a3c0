/*
 * Generated contract bindings for the pool ledger and the standard token
 * interface. Signatures match the deployed ABI.
 */

use ethers::contract::abigen;

abigen!(
    MaelstromPool,
    r#"[
        function initializePool(address token, uint256 amountToken, uint256 initialPriceBuy, uint256 initialPriceSell) external payable
        function deposit(address token) external payable
        function withdraw(address token, uint256 amountPoolToken) external
        function swap(address tokenSell, address tokenBuy, uint256 amountToSell, uint256 minimumAmountToken) external
        function buy(address token, uint256 minimumAmountToken) external payable
        function sell(address token, uint256 amount, uint256 minimumAmountEther) external
        function reserves(address token) external view returns (uint256, uint256)
        function priceBuy(address token) external view returns (uint256)
        function priceSell(address token) external view returns (uint256)
        function tokenPerETHRatio(address token) external view returns (uint256)
        function poolUserBalances(address token, address user) external view returns (uint256, uint256)
        function getPoolList(uint256 start, uint256 end) external view returns (address[])
        function getUserPools(address user, uint256 start, uint256 end) external view returns (address[])
        function getTotalPools() external view returns (uint256)
        function getUserTotalPools(address user) external view returns (uint256)
        function totalFees() external view returns (uint256)
        function totalPoolFees(address token) external view returns (uint256)
        function getPoolFeeEventsCount(address token) external view returns (uint256)
        struct FeeSample { uint256 fee; uint256 timestamp; }
        function getPoolFeeList(address token, uint256 start, uint256 end) external view returns (FeeSample[])
        function poolToken(address token) external view returns (address)
        function pools(address token) external view returns (uint256, uint256, uint256, uint256, uint256, uint256, uint256, uint256, uint256, uint256, uint256, uint256, uint256)
        event BuyTrade(address indexed token, address indexed trader, uint256 amountEther, uint256 amountToken, uint256 tradeBuyPrice, uint256 updatedBuyPrice, uint256 sellPrice)
        event SellTrade(address indexed token, address indexed trader, uint256 amountToken, uint256 amountEther, uint256 tradeSellPrice, uint256 updatedSellPrice, uint256 buyPrice)
        event SwapTrade(address indexed tokenSold, address indexed tokenBought, address indexed trader, uint256 amountTokenSold, uint256 amountTokenBought, uint256 tradeSellPrice, uint256 updatedSellPrice, uint256 tradeBuyPrice, uint256 updatedBuyPrice)
        event Deposit(address indexed token, address indexed user, uint256 amountEther, uint256 amountToken, uint256 lpTokensMinted)
        event Withdraw(address indexed token, address indexed user, uint256 amountEther, uint256 amountToken, uint256 lpTokensBurned)
    ]"#
);

abigen!(
    Erc20,
    r#"[
        function name() external view returns (string)
        function symbol() external view returns (string)
        function decimals() external view returns (uint8)
        function totalSupply() external view returns (uint256)
        function balanceOf(address owner) external view returns (uint256)
        function approve(address spender, uint256 value) external returns (bool)
    ]"#
);
