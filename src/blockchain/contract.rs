// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! Voting contract interface.

use alloy::sol;

// Define the voting contract interface using alloy's sol! macro
sol! {
    #[sol(rpc)]
    interface IVotingContract {
        function registerUser(
            string nim,
            string email,
            string username,
            string prodi,
            bytes32 passwordHash,
            address walletAddress
        ) external;

        function login(string nim, bytes32 passwordHash) external returns (bool);

        function getUserByNIM(string nim) external view returns (
            string email,
            string username,
            string prodi,
            address walletAddress,
            bool isRegistered,
            uint256 registeredAt,
            uint256 lastLoginAt,
            bool isLocked,
            uint256 passwordChangedAt
        );

        function changePassword(string nim, bytes32 oldPasswordHash, bytes32 newPasswordHash) external;

        function vote(uint256 candidateId, bytes32 messageHash, bytes signature) external;

        function hasVoted(address voter) external view returns (bool);

        function getVotingStatus() external view returns (
            bool active,
            uint256 startTime,
            uint256 endTime,
            uint256 currentTime,
            string sessionName
        );
    }
}
